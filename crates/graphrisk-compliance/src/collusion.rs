//! Collusion community detection.
//!
//! Companies tied by a shared legal person or a CONTROLS edge form
//! communities. Each community is scored on the contracts its members won
//! (PARTY_B): bid rotation, amount similarity, amounts parked just below an
//! approval threshold, and relation density.

use crate::messages::{CollusionInput, CollusionOutput};
use crate::relations::{control_neighbors, is_company_like, multi_company_persons};
use async_trait::async_trait;
use chrono::NaiveDate;
use graphrisk_core::{
    analysis::AnalysisMetadata,
    config::CollusionConfig,
    domain::Domain,
    error::Result,
    stats::{clamp_unit, coefficient_of_variation, mean, variance, Dispersion},
    traits::{Analysis, BatchAnalysis},
};
use graphrisk_graph::graph::RiskGraph;
use graphrisk_graph::types::{EdgeType, NodeIdx};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::time::Instant;
use tracing::{debug, info};

// ============================================================================
// Features
// ============================================================================

/// Regularity of wins across members.
///
/// 0 for fewer than 3 wins or a single winner, otherwise
/// `1 - min(var / mean², 1)` over the per-winner counts.
pub fn rotation_score<W: Eq + Hash>(winners: &[W]) -> f64 {
    if winners.len() < 3 {
        return 0.0;
    }
    let mut counts: HashMap<&W, usize> = HashMap::new();
    for w in winners {
        *counts.entry(w).or_default() += 1;
    }
    if counts.len() < 2 {
        return 0.0;
    }

    let counts: Vec<f64> = counts.values().map(|&c| c as f64).collect();
    match (mean(&counts), variance(&counts, Dispersion::Population)) {
        (Some(m), Some(var)) if m > 0.0 => 1.0 - (var / (m * m)).min(1.0),
        _ => 0.0,
    }
}

/// `1 - min(CV, 1)` with the sample standard deviation.
///
/// 0 for fewer than two amounts; a zero mean counts as identical amounts.
pub fn amount_similarity(amounts: &[f64]) -> f64 {
    if amounts.len() < 2 {
        return 0.0;
    }
    let cv = coefficient_of_variation(amounts, Dispersion::Sample).unwrap_or(0.0);
    1.0 - cv.min(1.0)
}

/// Whether an amount sits in `[t * (1 - margin), t]` for some threshold `t`.
pub fn near_threshold(amount: f64, thresholds: &[f64], margin: f64) -> bool {
    thresholds
        .iter()
        .any(|&t| amount >= t * (1.0 - margin) && amount <= t)
}

/// Share of amounts near an approval threshold.
pub fn threshold_ratio(amounts: &[f64], thresholds: &[f64], margin: f64) -> f64 {
    if amounts.is_empty() {
        return 0.0;
    }
    let near = amounts
        .iter()
        .filter(|&&a| near_threshold(a, thresholds, margin))
        .count();
    near as f64 / amounts.len() as f64
}

/// Feature values of one community.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CollusionFeatures {
    /// Bid rotation regularity.
    pub rotation: f64,
    /// Contract amount similarity.
    pub amount_similarity: f64,
    /// Share of amounts just below an approval threshold.
    pub threshold_ratio: f64,
    /// Relation pairs over possible pairs.
    pub density: f64,
    /// 1 for communities of two or more members.
    pub strong_relation: f64,
}

impl CollusionFeatures {
    /// Weighted composite.
    pub fn composite(&self, config: &CollusionConfig) -> f64 {
        let w = &config.weights;
        clamp_unit(
            w.rotation * self.rotation
                + w.amount_similarity * self.amount_similarity
                + w.threshold_ratio * self.threshold_ratio
                + w.density * self.density
                + w.strong_relation * self.strong_relation,
        )
    }
}

/// A scored community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollusionCommunity {
    /// `NETWORK_1`, `NETWORK_2`, ... in discovery order.
    pub network_id: String,
    /// Member ids in node order.
    pub members: Vec<String>,
    /// Member names.
    pub member_names: Vec<String>,
    /// Contracts won by members, in signing order.
    pub contracts: Vec<String>,
    /// Number of wins scored.
    pub contract_count: usize,
    /// Sum of contract amounts.
    pub total_amount: f64,
    /// Mean contract amount, 0 without amounts.
    pub avg_amount: f64,
    /// Feature values.
    pub features: CollusionFeatures,
    /// Weighted composite score.
    pub risk_score: f64,
    /// Composite reached the risk threshold.
    pub flagged: bool,
}

// ============================================================================
// Relation Graph
// ============================================================================

struct Relations {
    adjacency: HashMap<NodeIdx, BTreeSet<NodeIdx>>,
    pairs: HashSet<(NodeIdx, NodeIdx)>,
}

impl Relations {
    fn build(graph: &RiskGraph) -> Self {
        let mut relations = Relations {
            adjacency: HashMap::new(),
            pairs: HashSet::new(),
        };

        for (_, companies) in multi_company_persons(graph, EdgeType::LegalPerson) {
            for (i, &a) in companies.iter().enumerate() {
                for &b in &companies[i + 1..] {
                    relations.link(a, b);
                }
            }
        }
        for company in (0..graph.node_count()).filter(|&n| is_company_like(graph, n)) {
            for other in control_neighbors(graph, company) {
                if other != company && is_company_like(graph, other) {
                    relations.link(company, other);
                }
            }
        }
        relations
    }

    fn link(&mut self, a: NodeIdx, b: NodeIdx) {
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
        self.pairs.insert((a.min(b), a.max(b)));
    }

    /// Connected components in node order, members sorted.
    fn components(&self, node_count: usize) -> Vec<Vec<NodeIdx>> {
        let mut seen = HashSet::new();
        let mut components = Vec::new();

        for start in (0..node_count).filter(|n| self.adjacency.contains_key(n)) {
            if !seen.insert(start) {
                continue;
            }
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                for &next in self.adjacency.get(&current).into_iter().flatten() {
                    if seen.insert(next) {
                        component.push(next);
                        queue.push_back(next);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    fn density(&self, members: &[NodeIdx]) -> f64 {
        let n = members.len();
        if n < 2 {
            return 0.0;
        }
        let mut internal = 0usize;
        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                if self.pairs.contains(&(a.min(b), a.max(b))) {
                    internal += 1;
                }
            }
        }
        internal as f64 / (n * (n - 1) / 2) as f64
    }
}

// ============================================================================
// Collusion Detector
// ============================================================================

struct Win {
    winner: NodeIdx,
    contract: NodeIdx,
    amount: Option<f64>,
    sign_date: Option<NaiveDate>,
}

/// Collusion community detector.
#[derive(Debug, Clone)]
pub struct CollusionDetector {
    metadata: AnalysisMetadata,
}

impl CollusionDetector {
    /// Create a new collusion detector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: AnalysisMetadata::batch("compliance/collusion", Domain::Collusion)
                .with_description("Related-company communities scored for bid collusion"),
        }
    }

    /// Score every community of at least `min_cluster_size` members.
    pub fn compute(graph: &RiskGraph, config: &CollusionConfig) -> Result<Vec<CollusionCommunity>> {
        config.validate()?;

        let relations = Relations::build(graph);
        let communities: Vec<CollusionCommunity> = relations
            .components(graph.node_count())
            .into_iter()
            .filter(|members| members.len() >= config.min_cluster_size)
            .enumerate()
            .map(|(i, members)| Self::score(graph, &relations, &members, i + 1, config))
            .collect();

        debug!(
            communities = communities.len(),
            flagged = communities.iter().filter(|c| c.flagged).count(),
            "collusion scoring complete"
        );
        Ok(communities)
    }

    /// Contracts won by members, filtered to the window and in signing order.
    fn wins(graph: &RiskGraph, members: &[NodeIdx], config: &CollusionConfig) -> Vec<Win> {
        let mut wins: Vec<Win> = members
            .iter()
            .flat_map(|&m| graph.out_edges_of_type(m, EdgeType::PartyB))
            .map(|edge| {
                let attrs = graph.node(edge.to).as_contract();
                Win {
                    winner: edge.from,
                    contract: edge.to,
                    amount: attrs.map(|c| c.amount),
                    sign_date: attrs.and_then(|c| c.sign_date),
                }
            })
            .filter(|win| match &config.window {
                Some(window) => win.sign_date.is_some_and(|d| window.contains(d)),
                None => true,
            })
            .collect();

        // Undated contracts sort last.
        wins.sort_by(|a, b| {
            let key = |w: &Win| (w.sign_date.is_none(), w.sign_date);
            key(a)
                .cmp(&key(b))
                .then_with(|| graph.id(a.contract).cmp(graph.id(b.contract)))
        });
        wins
    }

    fn score(
        graph: &RiskGraph,
        relations: &Relations,
        members: &[NodeIdx],
        number: usize,
        config: &CollusionConfig,
    ) -> CollusionCommunity {
        let wins = Self::wins(graph, members, config);
        let amounts: Vec<f64> = wins.iter().filter_map(|w| w.amount).collect();

        let features = if wins.is_empty() {
            CollusionFeatures::default()
        } else {
            let winners: Vec<NodeIdx> = wins.iter().map(|w| w.winner).collect();
            CollusionFeatures {
                rotation: rotation_score(&winners),
                amount_similarity: amount_similarity(&amounts),
                threshold_ratio: threshold_ratio(
                    &amounts,
                    &config.approval_thresholds,
                    config.threshold_margin,
                ),
                density: relations.density(members),
                strong_relation: if members.len() >= 2 { 1.0 } else { 0.0 },
            }
        };
        let risk_score = if wins.is_empty() {
            0.0
        } else {
            features.composite(config)
        };

        CollusionCommunity {
            network_id: format!("NETWORK_{}", number),
            members: members.iter().map(|&m| graph.id(m).to_string()).collect(),
            member_names: members
                .iter()
                .map(|&m| graph.node(m).label().to_string())
                .collect(),
            contracts: wins.iter().map(|w| graph.id(w.contract).to_string()).collect(),
            contract_count: wins.len(),
            total_amount: amounts.iter().sum(),
            avg_amount: mean(&amounts).unwrap_or(0.0),
            features,
            risk_score,
            flagged: risk_score >= config.risk_threshold,
        }
    }
}

impl Default for CollusionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Analysis for CollusionDetector {
    fn metadata(&self) -> &AnalysisMetadata {
        &self.metadata
    }
}

#[async_trait]
impl BatchAnalysis<CollusionInput, CollusionOutput> for CollusionDetector {
    async fn execute(&self, input: CollusionInput) -> Result<CollusionOutput> {
        let start = Instant::now();
        let communities = Self::compute(&input.graph, &input.config)?;
        let compute_time_us = start.elapsed().as_micros() as u64;

        info!(
            communities = communities.len(),
            flagged = communities.iter().filter(|c| c.flagged).count(),
            compute_time_us,
            "collusion detection finished"
        );
        Ok(CollusionOutput {
            communities,
            compute_time_us,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphrisk_core::config::DateWindow;
    use graphrisk_graph::types::{CompanyAttrs, ContractAttrs, Node};
    use std::sync::Arc;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    /// X, Y and Z share legal person P and win six contracts in rotation,
    /// each just under the 1M approval threshold or close to it.
    fn bid_ring() -> RiskGraph {
        let mut graph = RiskGraph::new();
        for id in ["X", "Y", "Z"] {
            graph.add_node(Node::company(
                id,
                CompanyAttrs {
                    name: format!("{} Co", id),
                    ..Default::default()
                },
            ));
            graph.add_edge("P", id, EdgeType::LegalPerson, None);
        }
        let amounts = [950_000.0, 960_000.0, 955_000.0, 945_000.0, 958_000.0, 952_000.0];
        let winners = ["X", "Y", "Z", "X", "Y", "Z"];
        for (i, (amount, winner)) in amounts.iter().zip(winners).enumerate() {
            let id = format!("K{}", i + 1);
            graph.add_node(Node::contract(
                &id,
                ContractAttrs {
                    amount: *amount,
                    sign_date: Some(date(i as u32 + 1, 1)),
                    ..Default::default()
                },
            ));
            graph.add_edge(winner, &id, EdgeType::PartyB, None);
            graph.add_edge("Owner", &id, EdgeType::PartyA, None);
        }
        graph
    }

    #[test]
    fn test_rotation_score() {
        assert_eq!(rotation_score(&["X", "Y"]), 0.0);
        assert_eq!(rotation_score(&["X", "X", "X", "X"]), 0.0);
        assert_eq!(rotation_score(&["X", "Y", "Z", "X", "Y", "Z"]), 1.0);

        // counts 3 and 1: var 1, mean 2
        assert!((rotation_score(&["X", "X", "X", "Y"]) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_amount_similarity() {
        assert_eq!(amount_similarity(&[5.0]), 0.0);
        assert_eq!(amount_similarity(&[100.0, 100.0, 100.0]), 1.0);
        assert_eq!(amount_similarity(&[0.0, 0.0]), 1.0);
        assert_eq!(amount_similarity(&[1.0, 1000.0]), 0.0);
    }

    #[test]
    fn test_threshold_ratio() {
        let thresholds = [1_000_000.0, 3_000_000.0];
        assert!(near_threshold(950_000.0, &thresholds, 0.05));
        assert!(near_threshold(3_000_000.0, &thresholds, 0.05));
        assert!(!near_threshold(1_000_001.0, &thresholds, 0.05));
        assert!(!near_threshold(940_000.0, &thresholds, 0.05));
        assert_eq!(threshold_ratio(&[], &thresholds, 0.05), 0.0);
        assert_eq!(threshold_ratio(&[990_000.0, 10.0], &thresholds, 0.05), 0.5);
    }

    #[test]
    fn test_bid_ring_flagged() {
        let graph = bid_ring();
        let communities = CollusionDetector::compute(&graph, &CollusionConfig::default()).unwrap();
        assert_eq!(communities.len(), 1);

        let ring = &communities[0];
        assert_eq!(ring.network_id, "NETWORK_1");
        assert_eq!(ring.members, vec!["X", "Y", "Z"]);
        assert_eq!(ring.contract_count, 6);
        assert_eq!(ring.contracts[0], "K1");
        assert_eq!(ring.total_amount, 5_720_000.0);

        let f = &ring.features;
        assert_eq!(f.rotation, 1.0);
        assert!(f.amount_similarity > 0.99);
        assert!((f.threshold_ratio - 5.0 / 6.0).abs() < 1e-12);
        assert_eq!(f.density, 1.0);
        assert_eq!(f.strong_relation, 1.0);

        assert!(ring.flagged);
        assert!((ring.risk_score - 0.965).abs() < 0.001);
    }

    #[test]
    fn test_window_filters_contracts() {
        let graph = bid_ring();
        let config = CollusionConfig {
            window: Some(DateWindow::between(date(1, 1), date(2, 28))),
            ..Default::default()
        };
        let communities = CollusionDetector::compute(&graph, &config).unwrap();
        let ring = &communities[0];
        assert_eq!(ring.contracts, vec!["K1", "K2"]);
        // two wins cannot rotate
        assert_eq!(ring.features.rotation, 0.0);
    }

    #[test]
    fn test_controls_relation_and_min_size() {
        let mut graph = RiskGraph::new();
        graph.add_edge("A", "B", EdgeType::Controls, None);
        graph.add_edge("C", "B", EdgeType::Controls, None);
        graph.add_edge("D", "E", EdgeType::Controls, None);

        let communities = CollusionDetector::compute(&graph, &CollusionConfig::default()).unwrap();
        assert_eq!(communities.len(), 1);
        let abc = &communities[0];
        assert_eq!(abc.members, vec!["A", "B", "C"]);
        // A-B and B-C of three possible pairs
        assert!((relations_density(&graph, &["A", "B", "C"]) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(abc.contract_count, 0);
        assert_eq!(abc.risk_score, 0.0);
        assert_eq!(abc.features, CollusionFeatures::default());
        assert!(!abc.flagged);

        let config = CollusionConfig {
            min_cluster_size: 2,
            ..Default::default()
        };
        let communities = CollusionDetector::compute(&graph, &config).unwrap();
        assert_eq!(communities.len(), 2);
        assert_eq!(communities[1].network_id, "NETWORK_2");
        assert_eq!(communities[1].members, vec!["D", "E"]);
    }

    fn relations_density(graph: &RiskGraph, ids: &[&str]) -> f64 {
        let relations = Relations::build(graph);
        let members: Vec<NodeIdx> = ids.iter().filter_map(|id| graph.index_of(id)).collect();
        relations.density(&members)
    }

    #[tokio::test]
    async fn test_batch_execute() {
        let detector = CollusionDetector::new();
        let output = detector
            .execute(CollusionInput::new(Arc::new(bid_ring())))
            .await
            .unwrap();
        assert_eq!(output.communities.len(), 1);
        assert!(output.communities[0].flagged);
    }
}
