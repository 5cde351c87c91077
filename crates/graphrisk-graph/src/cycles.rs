//! Circular trade search.
//!
//! Depth-bounded search for closed TRADES_WITH walks:
//! - explicit stack, no recursion
//! - an edge is used at most once per path, nodes (the start included) may repeat
//! - a cycle needs at least three edges and at most `max_depth`
//! - amount similarity `1 - CV` flags suspiciously even cycles

use crate::graph::RiskGraph;
use crate::messages::{CycleSearchInput, CycleSearchOutput};
use crate::types::{EdgeIdx, EdgeType, NodeIdx};
use async_trait::async_trait;
use graphrisk_core::{
    analysis::AnalysisMetadata,
    cancel::CancellationToken,
    config::CycleConfig,
    domain::Domain,
    error::Result,
    stats::{clamp_unit, coefficient_of_variation, Dispersion},
    traits::{Analysis, BatchAnalysis},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

// ============================================================================
// Results
// ============================================================================

/// A closed trade walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeCycle {
    /// Node ids, first and last are the same.
    pub nodes: Vec<String>,
    /// Amount of each edge in walk order (missing amounts count as 0).
    pub amounts: Vec<f64>,
    /// Sum of `amounts`.
    pub total_amount: f64,
    /// `1 - CV(amounts)` in [0, 1].
    pub similarity: f64,
    /// Similarity reached the configured threshold.
    pub suspicious: bool,
}

impl TradeCycle {
    /// Number of edges.
    pub fn hops(&self) -> usize {
        self.amounts.len()
    }
}

/// Outcome of a cycle search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleSearchResult {
    /// Cycles in discovery order.
    pub cycles: Vec<TradeCycle>,
    /// The search stopped at `max_cycles`.
    pub truncated: bool,
}

impl CycleSearchResult {
    /// Cycles flagged as suspicious.
    pub fn suspicious(&self) -> impl Iterator<Item = &TradeCycle> {
        self.cycles.iter().filter(|c| c.suspicious)
    }
}

/// Amount similarity of a cycle.
///
/// Fewer than two amounts score 1.0; a zero mean scores 0.
pub fn amount_similarity(amounts: &[f64]) -> f64 {
    if amounts.len() < 2 {
        return 1.0;
    }
    match coefficient_of_variation(amounts, Dispersion::Population) {
        Some(cv) => clamp_unit(1.0 - cv),
        None => 0.0,
    }
}

// ============================================================================
// Cycle Search Analysis
// ============================================================================

/// Trade cycle search analysis.
#[derive(Debug, Clone)]
pub struct CycleSearch {
    metadata: AnalysisMetadata,
}

impl CycleSearch {
    /// Create a new cycle search analysis.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: AnalysisMetadata::batch("graph/trade-cycles", Domain::CircularTrade)
                .with_description("Depth-bounded circular trade search with amount similarity")
                .cancellable(),
        }
    }

    /// Search the graph for trade cycles.
    ///
    /// `start_nodes` restricts the roots; unknown ids are ignored. The token
    /// is checked before every edge expansion.
    pub fn compute(
        graph: &RiskGraph,
        config: &CycleConfig,
        start_nodes: Option<&[String]>,
        cancel: &CancellationToken,
    ) -> Result<CycleSearchResult> {
        config.validate()?;

        let starts: Vec<NodeIdx> = match start_nodes {
            Some(ids) => ids.iter().filter_map(|id| graph.index_of(id)).collect(),
            None => (0..graph.node_count())
                .filter(|&idx| {
                    graph
                        .out_edges_of_type(idx, EdgeType::TradesWith)
                        .next()
                        .is_some()
                })
                .collect(),
        };

        let mut result = CycleSearchResult::default();
        let mut seen: HashSet<Vec<EdgeIdx>> = HashSet::new();

        'roots: for start in starts {
            // (node, next outgoing edge position)
            let mut stack: Vec<(NodeIdx, usize)> = vec![(start, 0)];
            let mut path: Vec<EdgeIdx> = Vec::new();

            while let Some(frame) = stack.last_mut() {
                let out = graph.out_edges(frame.0);
                if frame.1 >= out.len() {
                    stack.pop();
                    path.pop();
                    continue;
                }
                let edge_idx = out[frame.1];
                frame.1 += 1;

                cancel.check("cycle search")?;

                let edge = graph.edge(edge_idx);
                if edge.edge_type != EdgeType::TradesWith || path.contains(&edge_idx) {
                    continue;
                }

                if edge.to == start && path.len() >= 2 {
                    let mut walk = path.clone();
                    walk.push(edge_idx);
                    if config.dedupe_rotations && !seen.insert(canonical_rotation(&walk)) {
                        continue;
                    }
                    result
                        .cycles
                        .push(Self::build_cycle(graph, &walk, config.similarity_threshold));
                    if let Some(max) = config.max_cycles {
                        if result.cycles.len() >= max {
                            warn!(max_cycles = max, "cycle search truncated");
                            result.truncated = true;
                            break 'roots;
                        }
                    }
                    continue;
                }

                // early returns to the start are walked through, so a walk may
                // pass the start before closing (A-B-A-C-D-A)

                if path.len() + 2 <= config.max_depth {
                    path.push(edge_idx);
                    stack.push((edge.to, 0));
                }
            }
        }

        debug!(
            cycles = result.cycles.len(),
            suspicious = result.suspicious().count(),
            "cycle search finished"
        );
        Ok(result)
    }

    fn build_cycle(graph: &RiskGraph, walk: &[EdgeIdx], threshold: f64) -> TradeCycle {
        let mut nodes = Vec::with_capacity(walk.len() + 1);
        let mut amounts = Vec::with_capacity(walk.len());
        if let Some(&first) = walk.first() {
            nodes.push(graph.id(graph.edge(first).from).to_string());
        }
        for &e in walk {
            let edge = graph.edge(e);
            nodes.push(graph.id(edge.to).to_string());
            amounts.push(edge.properties.amount.unwrap_or(0.0));
        }
        let similarity = amount_similarity(&amounts);
        TradeCycle {
            nodes,
            total_amount: amounts.iter().sum(),
            amounts,
            similarity,
            suspicious: similarity >= threshold,
        }
    }
}

/// Rotate so that the smallest edge index comes first.
fn canonical_rotation(walk: &[EdgeIdx]) -> Vec<EdgeIdx> {
    let pivot = walk
        .iter()
        .enumerate()
        .min_by_key(|(_, e)| **e)
        .map_or(0, |(i, _)| i);
    walk[pivot..].iter().chain(&walk[..pivot]).copied().collect()
}

impl Default for CycleSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl Analysis for CycleSearch {
    fn metadata(&self) -> &AnalysisMetadata {
        &self.metadata
    }
}

#[async_trait]
impl BatchAnalysis<CycleSearchInput, CycleSearchOutput> for CycleSearch {
    async fn execute(&self, input: CycleSearchInput) -> Result<CycleSearchOutput> {
        let start = Instant::now();
        let result = Self::compute(
            &input.graph,
            &input.config,
            input.start_nodes.as_deref(),
            &input.cancel,
        )?;
        let compute_time_us = start.elapsed().as_micros() as u64;

        info!(
            cycles = result.cycles.len(),
            compute_time_us, "trade cycle search finished"
        );
        Ok(CycleSearchOutput {
            result,
            compute_time_us,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EdgeProperties;
    use graphrisk_core::error::AnalysisError;
    use std::sync::Arc;

    fn trade(graph: &mut RiskGraph, from: &str, to: &str, amount: f64) {
        graph.add_edge_with(
            from,
            to,
            EdgeType::TradesWith,
            None,
            EdgeProperties::amount(amount, None),
        );
    }

    fn triangle(amounts: [f64; 3]) -> RiskGraph {
        let mut graph = RiskGraph::new();
        trade(&mut graph, "A", "B", amounts[0]);
        trade(&mut graph, "B", "C", amounts[1]);
        trade(&mut graph, "C", "A", amounts[2]);
        graph
    }

    fn search(graph: &RiskGraph, config: &CycleConfig) -> CycleSearchResult {
        CycleSearch::compute(graph, config, None, &CancellationToken::new()).unwrap()
    }

    #[test]
    fn test_even_triangle_is_suspicious() {
        let result = search(&triangle([100.0, 100.0, 100.0]), &CycleConfig::default());

        assert_eq!(result.cycles.len(), 1);
        let cycle = &result.cycles[0];
        assert_eq!(cycle.nodes, vec!["A", "B", "C", "A"]);
        assert_eq!(cycle.hops(), 3);
        assert_eq!(cycle.similarity, 1.0);
        assert!(cycle.suspicious);
        assert_eq!(cycle.total_amount, 300.0);
    }

    #[test]
    fn test_uneven_triangle_not_flagged() {
        let result = search(&triangle([100.0, 10.0, 100.0]), &CycleConfig::default());
        let cycle = &result.cycles[0];
        assert!(cycle.similarity < 0.5);
        assert!(!cycle.suspicious);
        assert_eq!(result.suspicious().count(), 0);
    }

    #[test]
    fn test_similarity_permutation_invariant() {
        let a = amount_similarity(&[100.0, 10.0, 100.0]);
        let b = amount_similarity(&[10.0, 100.0, 100.0]);
        let c = amount_similarity(&[100.0, 100.0, 10.0]);
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_similarity_edge_cases() {
        assert_eq!(amount_similarity(&[]), 1.0);
        assert_eq!(amount_similarity(&[42.0]), 1.0);
        assert_eq!(amount_similarity(&[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(amount_similarity(&[1.0, 1000.0, 1.0]), 0.0);
    }

    #[test]
    fn test_rotations_deduplicated() {
        let graph = triangle([1.0, 1.0, 1.0]);
        assert_eq!(search(&graph, &CycleConfig::default()).cycles.len(), 1);

        let config = CycleConfig {
            dedupe_rotations: false,
            ..Default::default()
        };
        assert_eq!(search(&graph, &config).cycles.len(), 3);
    }

    #[test]
    fn test_two_hop_loop_not_a_cycle() {
        let mut graph = RiskGraph::new();
        trade(&mut graph, "A", "B", 1.0);
        trade(&mut graph, "B", "A", 1.0);
        assert!(search(&graph, &CycleConfig::default()).cycles.is_empty());
    }

    #[test]
    fn test_walk_through_start() {
        // A-B-A-C-D-A: the early return over B is walked through
        let mut graph = RiskGraph::new();
        trade(&mut graph, "A", "B", 10.0);
        trade(&mut graph, "B", "A", 10.0);
        trade(&mut graph, "A", "C", 10.0);
        trade(&mut graph, "C", "D", 10.0);
        trade(&mut graph, "D", "A", 10.0);

        let result = search(&graph, &CycleConfig::default());
        let walks: Vec<&Vec<String>> = result.cycles.iter().map(|c| &c.nodes).collect();
        assert_eq!(
            walks,
            vec![
                &vec!["A", "B", "A", "C", "D", "A"],
                &vec!["A", "C", "D", "A"],
            ]
        );
        assert!(result.cycles.iter().all(|c| c.similarity == 1.0));

        let shallow = CycleConfig {
            max_depth: 4,
            ..Default::default()
        };
        assert_eq!(search(&graph, &shallow).cycles.len(), 1);
    }

    #[test]
    fn test_single_amount_cycle() {
        // only one edge carries an amount; the others count as 0
        let mut graph = RiskGraph::new();
        trade(&mut graph, "A", "B", 500.0);
        graph.add_edge("B", "C", EdgeType::TradesWith, None);
        graph.add_edge("C", "A", EdgeType::TradesWith, None);
        let result = search(&graph, &CycleConfig::default());
        assert_eq!(result.cycles.len(), 1);
        assert_eq!(result.cycles[0].amounts, vec![500.0, 0.0, 0.0]);
        assert!(!result.cycles[0].suspicious);

        // a one-hop loop never closes a cycle, so search results always carry
        // at least three amounts
        let mut graph = RiskGraph::new();
        trade(&mut graph, "A", "A", 500.0);
        assert!(search(&graph, &CycleConfig::default()).cycles.is_empty());
    }

    #[test]
    fn test_depth_bound() {
        let mut graph = RiskGraph::new();
        trade(&mut graph, "A", "B", 1.0);
        trade(&mut graph, "B", "C", 1.0);
        trade(&mut graph, "C", "D", 1.0);
        trade(&mut graph, "D", "A", 1.0);

        let shallow = CycleConfig {
            max_depth: 3,
            ..Default::default()
        };
        assert!(search(&graph, &shallow).cycles.is_empty());
        assert_eq!(search(&graph, &CycleConfig::default()).cycles.len(), 1);
    }

    #[test]
    fn test_self_loop_and_other_edge_types_ignored() {
        let mut graph = triangle([5.0, 5.0, 5.0]);
        trade(&mut graph, "B", "B", 5.0);
        graph.add_edge("C", "B", EdgeType::Controls, None);

        let result = search(&graph, &CycleConfig::default());
        // the self-loop can be spliced into the triangle exactly once
        assert!(result
            .cycles
            .iter()
            .any(|c| c.nodes == vec!["A", "B", "C", "A"]));
        assert!(result.cycles.iter().all(|c| c.hops() >= 3 && c.hops() <= 5));
    }

    #[test]
    fn test_parallel_edges_give_distinct_cycles() {
        let mut graph = triangle([1.0, 1.0, 1.0]);
        trade(&mut graph, "A", "B", 1.0);
        assert_eq!(search(&graph, &CycleConfig::default()).cycles.len(), 2);
    }

    #[test]
    fn test_start_nodes_and_cap() {
        let mut graph = triangle([1.0, 1.0, 1.0]);
        trade(&mut graph, "X", "Y", 1.0);
        trade(&mut graph, "Y", "Z", 1.0);
        trade(&mut graph, "Z", "X", 1.0);

        let only_x = vec!["X".to_string(), "ghost".to_string()];
        let result = CycleSearch::compute(
            &graph,
            &CycleConfig::default(),
            Some(&only_x),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(result.cycles.len(), 1);
        assert_eq!(result.cycles[0].nodes[0], "X");

        let capped = CycleConfig {
            max_cycles: Some(1),
            ..Default::default()
        };
        let result = search(&graph, &capped);
        assert_eq!(result.cycles.len(), 1);
        assert!(result.truncated);
    }

    #[test]
    fn test_cancelled_search() {
        let token = CancellationToken::new();
        token.cancel();
        let err = CycleSearch::compute(
            &triangle([1.0, 1.0, 1.0]),
            &CycleConfig::default(),
            None,
            &token,
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled(_)));
    }

    #[test]
    fn test_invalid_depth_rejected() {
        let config = CycleConfig {
            max_depth: 2,
            ..Default::default()
        };
        let err = CycleSearch::compute(
            &RiskGraph::new(),
            &config,
            None,
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(err.is_config_error());
    }

    #[tokio::test]
    async fn test_batch_execute() {
        let analysis = CycleSearch::new();
        let input = CycleSearchInput::new(Arc::new(triangle([3.0, 3.0, 3.0])));
        let output = analysis.execute(input).await.unwrap();
        assert_eq!(output.result.cycles.len(), 1);
    }
}
