//! Detector configuration: cycles, fan-out/fan-in patterns, shell clusters,
//! per-company shell scoring, collusion communities and performance risk.

use crate::error::{AnalysisError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inclusive date window; an open side is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateWindow {
    /// First day included.
    pub start: Option<NaiveDate>,
    /// Last day included.
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    /// Window between two dates, both included.
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Check whether a date falls inside.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    /// Window length in days, if bounded on both sides.
    pub fn duration_days(&self) -> Option<i64> {
        match (self.start, self.end) {
            (Some(s), Some(e)) => Some((e - s).num_days()),
            _ => None,
        }
    }
}

// ============================================================================
// Cycle Search
// ============================================================================

/// Bounded cycle search over trade edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Maximum number of hops in a cycle.
    pub max_depth: usize,
    /// Amount similarity at which a cycle is suspicious.
    pub similarity_threshold: f64,
    /// Report each rotation of the same edge sequence once.
    pub dedupe_rotations: bool,
    /// Stop after this many cycles (None = unbounded).
    pub max_cycles: Option<usize>,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            similarity_threshold: 0.9,
            dedupe_rotations: true,
            max_cycles: Some(10_000),
        }
    }
}

impl CycleConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_depth < 3 {
            return Err(AnalysisError::config(format!(
                "cycle max_depth must be at least 3, got {}",
                self.max_depth
            )));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(AnalysisError::config(
                "cycle similarity_threshold must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Fan-out / Fan-in
// ============================================================================

/// Weights of the fan pattern risk score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanPatternWeights {
    /// Inflow/outflow similarity.
    pub similarity: f64,
    /// Number of dispersed receivers.
    pub dispersion: f64,
    /// Trades among the dispersed receivers.
    pub relay: f64,
}

impl Default for FanPatternWeights {
    fn default() -> Self {
        Self {
            similarity: 0.4,
            dispersion: 0.3,
            relay: 0.3,
        }
    }
}

/// Dispersal-then-convergence detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanPatternConfig {
    /// Minimum amount for an outflow to count.
    pub amount_threshold: f64,
    /// Window length anchored at each outflow (None = unbounded).
    pub time_window_days: Option<u32>,
    /// Minimum number of distinct receivers.
    pub min_dispersed: usize,
    /// Inflow/outflow similarity at which a pattern is reported.
    pub similarity_threshold: f64,
    /// CONTROLS hops that still count as the same actor.
    pub related_control_hops: usize,
    /// Risk score weights.
    pub weights: FanPatternWeights,
    /// Dispersed count at which the dispersion term saturates.
    pub dispersion_normalizer: f64,
    /// Inter-trade count at which the relay term saturates.
    pub relay_normalizer: f64,
}

impl Default for FanPatternConfig {
    fn default() -> Self {
        Self {
            amount_threshold: 1_000_000.0,
            time_window_days: Some(180),
            min_dispersed: 2,
            similarity_threshold: 0.7,
            related_control_hops: 2,
            weights: FanPatternWeights::default(),
            dispersion_normalizer: 10.0,
            relay_normalizer: 20.0,
        }
    }
}

impl FanPatternConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.time_window_days == Some(0) {
            return Err(AnalysisError::config("time_window_days must be positive"));
        }
        if self.min_dispersed < 2 {
            return Err(AnalysisError::config("min_dispersed must be at least 2"));
        }
        if !(self.dispersion_normalizer > 0.0 && self.relay_normalizer > 0.0) {
            return Err(AnalysisError::config("fan pattern normalizers must be positive"));
        }
        if self.amount_threshold < 0.0 || !self.amount_threshold.is_finite() {
            return Err(AnalysisError::config("amount_threshold must be non-negative"));
        }
        Ok(())
    }
}

// ============================================================================
// Shell Clusters
// ============================================================================

/// Weights of the shell cluster score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellWeights {
    /// Credit concentration.
    pub exposure: f64,
    /// Few controllers for many companies.
    pub concealment: f64,
    /// Share of exposure traded inside the cluster.
    pub internal_trade: f64,
    /// Bonus when a member has an administrative penalty.
    pub penalty_bonus: f64,
    /// Bonus when a member has a business-abnormal record.
    pub abnormal_bonus: f64,
}

impl Default for ShellWeights {
    fn default() -> Self {
        Self {
            exposure: 0.30,
            concealment: 0.25,
            internal_trade: 0.20,
            penalty_bonus: 0.05,
            abnormal_bonus: 0.05,
        }
    }
}

/// Shell entity clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellClusterConfig {
    /// Smallest cluster reported.
    pub min_cluster_size: usize,
    /// Exposure at which the concentration term saturates.
    pub exposure_threshold: f64,
    /// Drop clusters made only of the group's own companies (on by default).
    pub exclude_internal: bool,
    /// Score weights.
    pub weights: ShellWeights,
    /// Lower bound of `HIGH`.
    pub high_threshold: f64,
    /// Lower bound of `MEDIUM`.
    pub medium_threshold: f64,
}

impl Default for ShellClusterConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 2,
            exposure_threshold: 10_000_000.0,
            exclude_internal: true,
            weights: ShellWeights::default(),
            high_threshold: 0.6,
            medium_threshold: 0.4,
        }
    }
}

impl ShellClusterConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.min_cluster_size < 2 {
            return Err(AnalysisError::config("shell min_cluster_size must be at least 2"));
        }
        if !(self.exposure_threshold > 0.0) {
            return Err(AnalysisError::config("exposure_threshold must be positive"));
        }
        if self.medium_threshold > self.high_threshold {
            return Err(AnalysisError::config(
                "shell medium_threshold must not exceed high_threshold",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Shell Companies
// ============================================================================

/// Points awarded by the per-company shell score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellCompanyWeights {
    /// Pass-through ratio at or above the strong bound.
    pub pass_through_strong: f64,
    /// Pass-through ratio at or above the weak bound.
    pub pass_through_weak: f64,
    /// Average gap between transactions below the fast bound.
    pub fast_velocity: f64,
    /// Average gap between transactions below the slow bound.
    pub slow_velocity: f64,
    /// Partner diversity below the low bound.
    pub low_diversity: f64,
    /// Partner diversity below the medium bound.
    pub medium_diversity: f64,
    /// Legal representative heads many other companies.
    pub many_legal_companies: f64,
    /// Legal representative heads some other companies.
    pub some_legal_companies: f64,
    /// Few contracts carrying large flows.
    pub concentrated_contracts: f64,
}

impl Default for ShellCompanyWeights {
    fn default() -> Self {
        Self {
            pass_through_strong: 0.25,
            pass_through_weak: 0.15,
            fast_velocity: 0.20,
            slow_velocity: 0.10,
            low_diversity: 0.20,
            medium_diversity: 0.10,
            many_legal_companies: 0.20,
            some_legal_companies: 0.10,
            concentrated_contracts: 0.15,
        }
    }
}

/// Per-company shell scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellCompanyConfig {
    /// Strong pass-through bound.
    pub pass_through_strong: f64,
    /// Weak pass-through bound.
    pub pass_through_weak: f64,
    /// Average days between transactions counted as fast.
    pub fast_velocity_days: f64,
    /// Average days between transactions counted as slow but suspicious.
    pub slow_velocity_days: f64,
    /// Partners per transaction counted as a single-partner pattern.
    pub low_diversity: f64,
    /// Partners per transaction counted as narrow.
    pub medium_diversity: f64,
    /// Other companies under the same legal representative counted as many.
    pub many_legal_companies: usize,
    /// Other companies under the same legal representative counted as some.
    pub some_legal_companies: usize,
    /// Average flow per contract counted as large.
    pub large_average_amount: f64,
    /// Contract count below which large flows are concentrated.
    pub few_contracts: usize,
    /// Score from which a company is high risk.
    pub high_risk_threshold: f64,
    /// Points per signal.
    pub weights: ShellCompanyWeights,
}

impl Default for ShellCompanyConfig {
    fn default() -> Self {
        Self {
            pass_through_strong: 0.9,
            pass_through_weak: 0.8,
            fast_velocity_days: 7.0,
            slow_velocity_days: 30.0,
            low_diversity: 0.2,
            medium_diversity: 0.4,
            many_legal_companies: 5,
            some_legal_companies: 3,
            large_average_amount: 5_000_000.0,
            few_contracts: 3,
            high_risk_threshold: 0.6,
            weights: ShellCompanyWeights::default(),
        }
    }
}

impl ShellCompanyConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.pass_through_weak > self.pass_through_strong {
            return Err(AnalysisError::config(
                "pass_through_weak must not exceed pass_through_strong",
            ));
        }
        if !(self.fast_velocity_days > 0.0 && self.fast_velocity_days <= self.slow_velocity_days) {
            return Err(AnalysisError::config(
                "velocity bounds must be positive with fast <= slow",
            ));
        }
        if self.low_diversity > self.medium_diversity {
            return Err(AnalysisError::config("low_diversity must not exceed medium_diversity"));
        }
        if self.some_legal_companies > self.many_legal_companies {
            return Err(AnalysisError::config(
                "some_legal_companies must not exceed many_legal_companies",
            ));
        }
        if !(0.0..=1.0).contains(&self.high_risk_threshold) {
            return Err(AnalysisError::config(
                "shell company high_risk_threshold must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Collusion Communities
// ============================================================================

/// Weights of the collusion composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollusionWeights {
    /// Bid rotation regularity.
    pub rotation: f64,
    /// Contract amount similarity.
    pub amount_similarity: f64,
    /// Share of amounts just below an approval threshold.
    pub threshold_ratio: f64,
    /// Relation density among members.
    pub density: f64,
    /// Fixed bonus for communities with at least two members.
    pub strong_relation: f64,
}

impl Default for CollusionWeights {
    fn default() -> Self {
        Self {
            rotation: 0.3,
            amount_similarity: 0.2,
            threshold_ratio: 0.2,
            density: 0.2,
            strong_relation: 0.1,
        }
    }
}

/// Collusion community detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollusionConfig {
    /// Smallest community scored.
    pub min_cluster_size: usize,
    /// Approval thresholds watched for gaming.
    pub approval_thresholds: Vec<f64>,
    /// Fraction below a threshold still counted as gaming it.
    pub threshold_margin: f64,
    /// Composite score at which a community is flagged.
    pub risk_threshold: f64,
    /// Composite weights.
    pub weights: CollusionWeights,
    /// Only contracts signed inside this window are scored.
    pub window: Option<DateWindow>,
}

impl Default for CollusionConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 3,
            approval_thresholds: vec![1_000_000.0, 3_000_000.0, 5_000_000.0, 10_000_000.0],
            threshold_margin: 0.05,
            risk_threshold: 0.5,
            weights: CollusionWeights::default(),
            window: None,
        }
    }
}

impl CollusionConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.min_cluster_size < 2 {
            return Err(AnalysisError::config(
                "collusion min_cluster_size must be at least 2",
            ));
        }
        if !(0.0..1.0).contains(&self.threshold_margin) {
            return Err(AnalysisError::config("threshold_margin must be within [0, 1)"));
        }
        if self.approval_thresholds.iter().any(|t| !(*t > 0.0)) {
            return Err(AnalysisError::config("approval thresholds must be positive"));
        }
        Ok(())
    }
}

// ============================================================================
// Performance Risk
// ============================================================================

/// Overdue performance scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformRiskConfig {
    /// Companies reported.
    pub top_n: usize,
    /// Transaction status meaning fulfilled.
    pub completed_status: String,
    /// Points per overdue transaction before the severity boost.
    pub overdue_weight: f64,
    /// Cap of the overdue term.
    pub overdue_cap: f64,
    /// Days overdue at which severity saturates.
    pub severity_horizon_days: f64,
    /// Exponent applied to the overdue fraction of the horizon.
    pub severity_exponent: f64,
    /// Extra multiplier reached at full severity.
    pub severity_boost: f64,
    /// Weight of the share of risk contracts that are overdue themselves.
    pub overdue_contract_weight: f64,
    /// Weight of the risk contract amount.
    pub amount_weight: f64,
    /// Risk contract amount at which the amount term saturates.
    pub amount_ceiling: f64,
}

impl Default for PerformRiskConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            completed_status: "C".to_string(),
            overdue_weight: 0.15,
            overdue_cap: 0.5,
            severity_horizon_days: 365.0,
            severity_exponent: 0.7,
            severity_boost: 0.5,
            overdue_contract_weight: 0.3,
            amount_weight: 0.2,
            amount_ceiling: 10_000_000.0,
        }
    }
}

impl PerformRiskConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(AnalysisError::config("perform risk top_n must be positive"));
        }
        if !(self.severity_horizon_days > 0.0 && self.severity_exponent > 0.0) {
            return Err(AnalysisError::config(
                "severity_horizon_days and severity_exponent must be positive",
            ));
        }
        if !(self.amount_ceiling > 0.0) {
            return Err(AnalysisError::config("amount_ceiling must be positive"));
        }
        let weights = [
            self.overdue_weight,
            self.overdue_cap,
            self.severity_boost,
            self.overdue_contract_weight,
            self.amount_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AnalysisError::config("perform risk weights must be non-negative"));
        }
        Ok(())
    }
}
