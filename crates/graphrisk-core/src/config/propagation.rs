//! Risk propagation configuration: diffusion parameters, edge weights, seed
//! scoring tables and risk bands.

use crate::domain::RiskLevel;
use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weight used for edge types absent from the table.
pub const DEFAULT_EDGE_WEIGHT: f64 = 0.3;

fn weight_table(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AnalysisError::config(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::config(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}

// ============================================================================
// Diffusion
// ============================================================================

/// Damped diffusion parameters and the edge weight table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Share of a node's score taken from its in-neighbours, in (0, 1).
    pub damping: f64,
    /// Iteration budget.
    pub max_iterations: u32,
    /// Stop once the largest per-node change drops below this.
    pub tolerance: f64,
    /// Propagation weight per edge type name (e.g. `CONTROLS`).
    pub edge_weights: BTreeMap<String, f64>,
    /// Weight for edge types missing from `edge_weights`.
    pub default_edge_weight: f64,
    /// Blend factor for externally supplied similarity:
    /// `alpha * type_weight + (1 - alpha) * similarity`.
    pub similarity_alpha: f64,
    /// Edge types that carry risk; `None` lets every edge in the graph propagate.
    /// Out-degrees are counted over the same edge set.
    pub edge_types: Option<Vec<String>>,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-6,
            edge_weights: weight_table(&[
                ("CONTROLS", 0.8),
                ("LEGAL_PERSON", 0.75),
                ("PAYS", 0.65),
                ("RECEIVES", 0.60),
                ("TRADES_WITH", 0.50),
                ("IS_SUPPLIER", 0.45),
                ("IS_CUSTOMER", 0.40),
                ("PARTY_A", 0.50),
                ("PARTY_B", 0.50),
                ("HAS_PARTY", 1.0),
            ]),
            default_edge_weight: DEFAULT_EDGE_WEIGHT,
            similarity_alpha: 0.7,
            edge_types: None,
        }
    }
}

impl PropagationConfig {
    /// Legal event propagation: only the weighted relation types carry risk.
    pub fn fraud_rank() -> Self {
        let mut config = Self::default();
        config.edge_types = Some(config.edge_weights.keys().cloned().collect());
        config
    }

    /// External risk propagation over ownership, trade and representation edges.
    pub fn external_risk() -> Self {
        let mut config = Self::default();
        config.edge_weights.insert("CONTROLS".to_string(), 0.85);
        config.edge_types = Some(
            ["CONTROLS", "TRADES_WITH", "IS_SUPPLIER", "IS_CUSTOMER", "LEGAL_PERSON"]
                .iter()
                .map(|t| (*t).to_string())
                .collect(),
        );
        config
    }

    /// Whether edges of this type take part in propagation.
    pub fn propagates(&self, edge_type: &str) -> bool {
        self.edge_types
            .as_ref()
            .map_or(true, |types| types.iter().any(|t| t == edge_type))
    }

    /// Weight for an edge type, falling back to `default_edge_weight`.
    pub fn edge_weight(&self, edge_type: &str) -> f64 {
        self.edge_weights
            .get(edge_type)
            .copied()
            .unwrap_or(self.default_edge_weight)
    }

    /// Set damping
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Set the iteration budget
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set tolerance
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Override one edge type weight
    pub fn with_edge_weight(mut self, edge_type: impl Into<String>, weight: f64) -> Self {
        self.edge_weights.insert(edge_type.into(), weight);
        self
    }

    /// Validate before any iteration runs.
    pub fn validate(&self) -> Result<()> {
        if !(self.damping.is_finite() && self.damping > 0.0 && self.damping < 1.0) {
            return Err(AnalysisError::config(format!(
                "damping must be within (0, 1), got {}",
                self.damping
            )));
        }
        check_positive("tolerance", self.tolerance)?;
        check_unit("similarity_alpha", self.similarity_alpha)?;
        check_unit("default_edge_weight", self.default_edge_weight)?;
        for (edge_type, weight) in &self.edge_weights {
            check_unit(&format!("edge weight {}", edge_type), *weight)?;
        }
        Ok(())
    }
}

// ============================================================================
// Risk Bands
// ============================================================================

/// Score thresholds for banding scores into risk levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskBands {
    /// Lower bound of `HIGH`.
    pub high: f64,
    /// Lower bound of `MEDIUM`.
    pub medium: f64,
    /// Lower bound of `LOW`.
    pub low: f64,
}

impl Default for RiskBands {
    fn default() -> Self {
        Self::fraud_rank()
    }
}

impl RiskBands {
    /// Bands for legal-event fraud rank.
    pub const fn fraud_rank() -> Self {
        Self {
            high: 0.7,
            medium: 0.4,
            low: 0.2,
        }
    }

    /// Bands for external risk rank.
    pub const fn external_risk() -> Self {
        Self {
            high: 0.6,
            medium: 0.3,
            low: 0.1,
        }
    }

    /// Band a score.
    pub fn classify(&self, score: f64) -> RiskLevel {
        if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else if score >= self.low {
            RiskLevel::Low
        } else {
            RiskLevel::Normal
        }
    }

    /// Bands must be ordered `low <= medium <= high`.
    pub fn validate(&self) -> Result<()> {
        if self.low <= self.medium && self.medium <= self.high {
            Ok(())
        } else {
            Err(AnalysisError::config(format!(
                "risk bands must satisfy low <= medium <= high, got {}/{}/{}",
                self.low, self.medium, self.high
            )))
        }
    }
}

// ============================================================================
// Fraud Rank (legal events)
// ============================================================================

/// Relative weight of each legal event factor in the seed score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedFactorWeights {
    /// Event category factor.
    pub event_type: f64,
    /// Normalized amount factor.
    pub amount: f64,
    /// Litigation status factor.
    pub status: f64,
}

impl Default for SeedFactorWeights {
    fn default() -> Self {
        Self {
            event_type: 0.4,
            amount: 0.35,
            status: 0.25,
        }
    }
}

/// Fraud rank: legal events seed, propagation spreads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudRankConfig {
    /// Diffusion parameters.
    pub propagation: PropagationConfig,
    /// Weight per legal event category (`Case`, `Dispute`).
    pub event_type_weights: BTreeMap<String, f64>,
    /// Weight for unknown categories.
    pub event_type_default_weight: f64,
    /// Weight per status code (`F` filed, `I` first instance, `J` enforcement, `N` closed).
    pub status_weights: BTreeMap<String, f64>,
    /// Weight for unknown status codes.
    pub status_default_weight: f64,
    /// Amount at which the amount factor saturates.
    pub amount_ceiling: f64,
    /// Factor weights.
    pub init_score_weights: SeedFactorWeights,
    /// Score bands.
    pub bands: RiskBands,
    /// Number of companies kept in the ranking report.
    pub top_n: usize,
}

impl Default for FraudRankConfig {
    fn default() -> Self {
        Self {
            propagation: PropagationConfig::fraud_rank(),
            event_type_weights: weight_table(&[("Case", 0.8), ("Dispute", 0.5)]),
            event_type_default_weight: 0.3,
            status_weights: weight_table(&[("F", 0.9), ("I", 0.8), ("J", 0.7), ("N", 0.4)]),
            status_default_weight: 0.5,
            amount_ceiling: 10_000_000.0,
            init_score_weights: SeedFactorWeights::default(),
            bands: RiskBands::fraud_rank(),
            top_n: 50,
        }
    }
}

impl FraudRankConfig {
    /// Category weight with fallback.
    pub fn event_type_weight(&self, category: &str) -> f64 {
        self.event_type_weights
            .get(category)
            .copied()
            .unwrap_or(self.event_type_default_weight)
    }

    /// Status weight with fallback.
    pub fn status_weight(&self, status: &str) -> f64 {
        self.status_weights
            .get(status)
            .copied()
            .unwrap_or(self.status_default_weight)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.propagation.validate()?;
        self.bands.validate()?;
        check_positive("amount_ceiling", self.amount_ceiling)?;
        let w = &self.init_score_weights;
        for (name, value) in [
            ("init_score_weights.event_type", w.event_type),
            ("init_score_weights.amount", w.amount),
            ("init_score_weights.status", w.status),
        ] {
            check_unit(name, value)?;
        }
        Ok(())
    }
}

// ============================================================================
// External Risk Rank (penalties, abnormal operations)
// ============================================================================

/// Factor weights for administrative penalties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyWeights {
    /// Normalized fine amount.
    pub amount: f64,
    /// Penalty status.
    pub status: f64,
    /// Severity read from the description.
    pub severity: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            amount: 0.4,
            status: 0.3,
            severity: 0.3,
        }
    }
}

/// Factor weights for business-abnormal records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbnormalWeights {
    /// Record status.
    pub status: f64,
    /// Listing reason.
    pub reason: f64,
}

impl Default for AbnormalWeights {
    fn default() -> Self {
        Self {
            status: 0.6,
            reason: 0.4,
        }
    }
}

/// External risk rank: penalties and abnormal operation records seed companies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalRiskConfig {
    /// Diffusion parameters.
    pub propagation: PropagationConfig,
    /// Penalty factor weights.
    pub penalty_weights: PenaltyWeights,
    /// Weight per penalty status.
    pub penalty_status_weights: BTreeMap<String, f64>,
    /// Weight for unknown penalty statuses.
    pub penalty_status_default_weight: f64,
    /// Fine amount at which the amount factor saturates.
    pub penalty_amount_max: f64,
    /// Abnormal record factor weights.
    pub abnormal_weights: AbnormalWeights,
    /// Weight per abnormal record status.
    pub abnormal_status_weights: BTreeMap<String, f64>,
    /// Weight for unknown abnormal statuses.
    pub abnormal_status_default_weight: f64,
    /// Score bands.
    pub bands: RiskBands,
    /// Number of companies kept in the ranking report.
    pub top_n: usize,
}

impl Default for ExternalRiskConfig {
    fn default() -> Self {
        Self {
            propagation: PropagationConfig::external_risk(),
            penalty_weights: PenaltyWeights::default(),
            penalty_status_weights: BTreeMap::new(),
            penalty_status_default_weight: 0.6,
            penalty_amount_max: 1_000_000.0,
            abnormal_weights: AbnormalWeights::default(),
            abnormal_status_weights: weight_table(&[("removed", 0.5)]),
            abnormal_status_default_weight: 0.9,
            bands: RiskBands::external_risk(),
            top_n: 50,
        }
    }
}

impl ExternalRiskConfig {
    /// Penalty status weight with fallback.
    pub fn penalty_status_weight(&self, status: &str) -> f64 {
        self.penalty_status_weights
            .get(status)
            .copied()
            .unwrap_or(self.penalty_status_default_weight)
    }

    /// Abnormal status weight with fallback.
    pub fn abnormal_status_weight(&self, status: &str) -> f64 {
        self.abnormal_status_weights
            .get(status)
            .copied()
            .unwrap_or(self.abnormal_status_default_weight)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.propagation.validate()?;
        self.bands.validate()?;
        check_positive("penalty_amount_max", self.penalty_amount_max)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_weight_fallback() {
        let config = PropagationConfig::default();
        assert_eq!(config.edge_weight("CONTROLS"), 0.8);
        assert_eq!(config.edge_weight("RELATED_TO"), DEFAULT_EDGE_WEIGHT);
        assert_eq!(PropagationConfig::external_risk().edge_weight("CONTROLS"), 0.85);
    }

    #[test]
    fn test_propagating_edge_sets() {
        assert!(PropagationConfig::default().propagates("RELATED_TO"));

        let fraud = PropagationConfig::fraud_rank();
        assert!(fraud.propagates("HAS_PARTY"));
        assert!(!fraud.propagates("RELATED_TO"));

        let external = PropagationConfig::external_risk();
        assert!(external.propagates("CONTROLS"));
        assert!(!external.propagates("PAYS"));
    }

    #[test]
    fn test_damping_rejected() {
        for damping in [-0.5, 0.0, 1.0, f64::NAN] {
            let config = PropagationConfig::default().with_damping(damping);
            assert!(config.validate().is_err(), "damping {} accepted", damping);
        }
        assert!(PropagationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_weight_out_of_range_rejected() {
        let config = PropagationConfig::default().with_edge_weight("PAYS", 1.5);
        assert!(config.validate().is_err());
        let config = PropagationConfig::default().with_tolerance(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bands() {
        let bands = RiskBands::fraud_rank();
        assert_eq!(bands.classify(0.75), RiskLevel::High);
        assert_eq!(bands.classify(0.4), RiskLevel::Medium);
        assert_eq!(bands.classify(0.2), RiskLevel::Low);
        assert_eq!(bands.classify(0.19), RiskLevel::Normal);

        let bands = RiskBands::external_risk();
        assert_eq!(bands.classify(0.6), RiskLevel::High);
        assert_eq!(bands.classify(0.1), RiskLevel::Low);

        let inverted = RiskBands {
            high: 0.1,
            medium: 0.5,
            low: 0.2,
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_seed_table_fallbacks() {
        let config = FraudRankConfig::default();
        assert_eq!(config.event_type_weight("Case"), 0.8);
        assert_eq!(config.event_type_weight("Arbitration"), 0.3);
        assert_eq!(config.status_weight("F"), 0.9);
        assert_eq!(config.status_weight("?"), 0.5);

        let external = ExternalRiskConfig::default();
        assert_eq!(external.penalty_status_weight("anything"), 0.6);
        assert_eq!(external.abnormal_status_weight("removed"), 0.5);
        assert_eq!(external.abnormal_status_weight("listed"), 0.9);
    }
}
