//! Seed scoring.
//!
//! Turns anomaly records into initial risk for propagation:
//! - legal events seed the contracts and persons attached to them
//! - administrative penalties and business-abnormal listings seed the
//!   company carrying them
//!
//! Every record score is bounded to [0, 1]; a node collecting several records
//! keeps the maximum.

use graphrisk_core::config::{DateWindow, ExternalRiskConfig, FraudRankConfig};
use graphrisk_core::stats::{clamp_unit, normalize};
use graphrisk_graph::graph::RiskGraph;
use graphrisk_graph::propagation::SeedScores;
use graphrisk_graph::types::{AdminPenalty, BusinessAbnormal, EdgeType, LegalEventAttrs, NodeType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Kind of record behind a seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedKind {
    /// Litigation case or dispute.
    LegalEvent,
    /// Administrative penalty.
    Penalty,
    /// Business-abnormal listing.
    Abnormal,
}

/// One record that contributed to a node's seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedEvidence {
    /// Record kind.
    pub kind: SeedKind,
    /// Event id, or `<company>#penalty-<n>` / `<company>#abnormal-<n>`.
    pub source_id: String,
    /// Record score.
    pub score: f64,
}

/// Seeds plus the records behind them.
#[derive(Debug, Clone, Default)]
pub struct SeedSet {
    /// Initial scores.
    pub seeds: SeedScores,
    /// Records per seeded node id.
    pub evidence: HashMap<String, Vec<SeedEvidence>>,
}

impl SeedSet {
    fn record(&mut self, node_id: &str, evidence: SeedEvidence) {
        self.seeds.raise(node_id, evidence.score);
        self.evidence
            .entry(node_id.to_string())
            .or_default()
            .push(evidence);
    }

    /// Records behind a node's seed.
    pub fn evidence_for(&self, node_id: &str) -> &[SeedEvidence] {
        self.evidence
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Which company records seed the external risk rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalSources {
    /// Penalties and abnormal listings.
    #[default]
    All,
    /// Administrative penalties only.
    Penalties,
    /// Business-abnormal listings only.
    Abnormal,
}

impl ExternalSources {
    fn penalties(self) -> bool {
        matches!(self, Self::All | Self::Penalties)
    }

    fn abnormal(self) -> bool {
        matches!(self, Self::All | Self::Abnormal)
    }
}

// ============================================================================
// Legal Events
// ============================================================================

/// Score of one legal event.
pub fn legal_event_score(event: &LegalEventAttrs, config: &FraudRankConfig) -> f64 {
    let w = &config.init_score_weights;
    clamp_unit(
        w.event_type * config.event_type_weight(&event.category)
            + w.amount * normalize(event.amount, config.amount_ceiling)
            + w.status * config.status_weight(&event.status),
    )
}

/// Seeds from every described legal event, attached to the contracts
/// (RELATED_TO) and persons (INVOLVED_IN) pointing at it.
pub fn legal_event_seeds(graph: &RiskGraph, config: &FraudRankConfig) -> SeedSet {
    let mut set = SeedSet::default();

    for (idx, node) in graph.nodes_of_type(NodeType::LegalEvent) {
        let Some(event) = node.as_legal_event() else {
            continue;
        };
        let score = legal_event_score(event, config);

        let subjects = graph
            .in_edges_of_type(idx, EdgeType::RelatedTo)
            .chain(graph.in_edges_of_type(idx, EdgeType::InvolvedIn));
        for edge in subjects {
            set.record(
                graph.id(edge.from),
                SeedEvidence {
                    kind: SeedKind::LegalEvent,
                    source_id: node.id.clone(),
                    score,
                },
            );
        }
    }

    debug!(seeded = set.seeds.len(), "legal event seeds");
    set
}

// ============================================================================
// Penalties and Abnormal Listings
// ============================================================================

/// Severity read from a penalty description.
pub fn penalty_severity(description: &str) -> f64 {
    let text = description.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| text.contains(w));

    if has(&["安全", "safety"]) {
        0.9
    } else if has(&["罚款", "fine"]) {
        0.7
    } else if has(&["警告", "通报批评", "warning", "criticism"]) {
        0.4
    } else {
        0.5
    }
}

/// Severity read from an abnormal listing reason.
pub fn abnormal_reason_weight(reason: &str) -> f64 {
    let text = reason.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| text.contains(w));

    if has(&["无法联系", "住所", "unreachable", "address"]) {
        0.7
    } else if has(&["年度报告", "annual report"]) {
        0.4
    } else if has(&["弄虚作假", "隐瞒", "fraud", "conceal"]) {
        0.9
    } else {
        0.5
    }
}

/// Score of one administrative penalty.
pub fn penalty_score(penalty: &AdminPenalty, config: &ExternalRiskConfig) -> f64 {
    let w = &config.penalty_weights;
    clamp_unit(
        w.amount * normalize(penalty.amount, config.penalty_amount_max)
            + w.status * config.penalty_status_weight(&penalty.status)
            + w.severity * penalty_severity(&penalty.description),
    )
}

/// Score of one business-abnormal listing.
pub fn abnormal_score(record: &BusinessAbnormal, config: &ExternalRiskConfig) -> f64 {
    let w = &config.abnormal_weights;
    clamp_unit(
        w.status * config.abnormal_status_weight(&record.status)
            + w.reason * abnormal_reason_weight(&record.reason),
    )
}

/// Undated records never fall inside a window.
fn in_window(window: Option<&DateWindow>, date: Option<chrono::NaiveDate>) -> bool {
    match window {
        None => true,
        Some(window) => date.is_some_and(|d| window.contains(d)),
    }
}

/// Seeds from company penalty and abnormal records.
pub fn external_seeds(
    graph: &RiskGraph,
    config: &ExternalRiskConfig,
    sources: ExternalSources,
    window: Option<&DateWindow>,
) -> SeedSet {
    let mut set = SeedSet::default();

    for (_, node) in graph.nodes_of_type(NodeType::Company) {
        let Some(company) = node.as_company() else {
            continue;
        };

        if sources.penalties() {
            for (i, penalty) in company.penalties.iter().enumerate() {
                if !in_window(window, penalty.date) {
                    continue;
                }
                set.record(
                    &node.id,
                    SeedEvidence {
                        kind: SeedKind::Penalty,
                        source_id: format!("{}#penalty-{}", node.id, i),
                        score: penalty_score(penalty, config),
                    },
                );
            }
        }

        if sources.abnormal() {
            for (i, record) in company.abnormal_records.iter().enumerate() {
                if !in_window(window, record.register_date) {
                    continue;
                }
                set.record(
                    &node.id,
                    SeedEvidence {
                        kind: SeedKind::Abnormal,
                        source_id: format!("{}#abnormal-{}", node.id, i),
                        score: abnormal_score(record, config),
                    },
                );
            }
        }
    }

    debug!(seeded = set.seeds.len(), ?sources, "external seeds");
    set
}
