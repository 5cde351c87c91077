//! Contract risk subgraph.
//!
//! Explanation view rooted at one contract: its legal events, the persons
//! involved in them, its parties and their representatives, then the
//! parties' other disputed contracts, down to a depth bound.

use crate::graph::RiskGraph;
use crate::messages::{SubgraphInput, SubgraphOutput};
use crate::types::{EdgeProperties, EdgeType, NodeIdx, NodeKind, NodeType};
use async_trait::async_trait;
use graphrisk_core::{
    analysis::AnalysisMetadata,
    domain::Domain,
    error::{AnalysisError, Result},
    traits::{Analysis, BatchAnalysis},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::debug;

/// Default exploration depth.
pub const DEFAULT_SUBGRAPH_DEPTH: usize = 3;

/// Node of the explanation view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgraphNode {
    /// Node id.
    pub id: String,
    /// Node type, `None` for stubs.
    #[serde(rename = "type")]
    pub node_type: Option<NodeType>,
    /// Display label.
    pub label: String,
    /// Node attributes as JSON.
    pub properties: serde_json::Value,
}

/// Edge of the explanation view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgraphEdge {
    /// Source id.
    pub source: String,
    /// Target id.
    pub target: String,
    /// Relation type.
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    /// Edge properties.
    pub properties: EdgeProperties,
}

/// Subgraph rooted at a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRiskSubgraph {
    /// Root contract id.
    pub root_contract_id: String,
    /// Nodes in discovery order.
    pub nodes: Vec<SubgraphNode>,
    /// Edges in discovery order, one per `(source, target, type)`.
    pub edges: Vec<SubgraphEdge>,
    /// Depth bound used.
    pub depth: usize,
}

impl ContractRiskSubgraph {
    /// True when nothing was found.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

struct Collector<'g> {
    graph: &'g RiskGraph,
    nodes: Vec<SubgraphNode>,
    node_seen: HashSet<NodeIdx>,
    edges: Vec<SubgraphEdge>,
    edge_seen: HashSet<(NodeIdx, NodeIdx, EdgeType)>,
}

impl<'g> Collector<'g> {
    fn new(graph: &'g RiskGraph) -> Self {
        Self {
            graph,
            nodes: Vec::new(),
            node_seen: HashSet::new(),
            edges: Vec::new(),
            edge_seen: HashSet::new(),
        }
    }

    fn node(&mut self, idx: NodeIdx) -> Result<()> {
        if !self.node_seen.insert(idx) {
            return Ok(());
        }
        let node = self.graph.node(idx);
        let properties = match &node.kind {
            NodeKind::Person(a) => serde_json::to_value(a)?,
            NodeKind::Company(a) => serde_json::to_value(a)?,
            NodeKind::Contract(a) => serde_json::to_value(a)?,
            NodeKind::LegalEvent(a) => serde_json::to_value(a)?,
            NodeKind::Transaction(a) => serde_json::to_value(a)?,
            NodeKind::Stub => serde_json::Value::Null,
        };
        self.nodes.push(SubgraphNode {
            id: node.id.clone(),
            node_type: node.node_type(),
            label: node.label().to_string(),
            properties,
        });
        Ok(())
    }

    fn edge(&mut self, from: NodeIdx, to: NodeIdx, edge_type: EdgeType, properties: &EdgeProperties) {
        if self.edge_seen.insert((from, to, edge_type)) {
            self.edges.push(SubgraphEdge {
                source: self.graph.id(from).to_string(),
                target: self.graph.id(to).to_string(),
                edge_type,
                properties: properties.clone(),
            });
        }
    }
}

// ============================================================================
// Contract Subgraph Analysis
// ============================================================================

/// Contract risk subgraph analysis.
#[derive(Debug, Clone)]
pub struct ContractSubgraph {
    metadata: AnalysisMetadata,
}

impl ContractSubgraph {
    /// Create a new contract subgraph analysis.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: AnalysisMetadata::batch("graph/contract-subgraph", Domain::Investigation)
                .with_description("Legal event context around a contract and its parties"),
        }
    }

    /// Extract the subgraph around `contract_id`.
    ///
    /// Unknown ids and non-contract roots give an empty subgraph.
    pub fn compute(graph: &RiskGraph, contract_id: &str, max_depth: usize) -> Result<ContractRiskSubgraph> {
        if max_depth == 0 {
            return Err(AnalysisError::validation("subgraph max_depth must be at least 1"));
        }

        let mut collector = Collector::new(graph);
        let root = graph
            .index_of(contract_id)
            .filter(|&idx| graph.node(idx).node_type() == Some(NodeType::Contract));

        if let Some(root) = root {
            let mut visited: HashSet<NodeIdx> = HashSet::new();
            let mut stack: Vec<(NodeIdx, usize)> = vec![(root, 1)];

            while let Some((contract, depth)) = stack.pop() {
                if depth > max_depth || !visited.insert(contract) {
                    continue;
                }
                collector.node(contract)?;

                for event_edge in graph.out_edges_of_type(contract, EdgeType::RelatedTo) {
                    let event = event_edge.to;
                    collector.node(event)?;
                    collector.edge(contract, event, EdgeType::RelatedTo, &event_edge.properties);
                    for involved in graph.in_edges_of_type(event, EdgeType::InvolvedIn) {
                        collector.node(involved.from)?;
                        collector.edge(involved.from, event, EdgeType::InvolvedIn, &involved.properties);
                    }
                }

                let parties: Vec<NodeIdx> = graph
                    .in_edges(contract)
                    .iter()
                    .map(|&e| graph.edge(e))
                    .filter(|e| e.edge_type.is_party())
                    .map(|e| {
                        collector.edge(e.from, contract, e.edge_type, &e.properties);
                        e.from
                    })
                    .collect();

                let mut next = Vec::new();
                for &party in &parties {
                    collector.node(party)?;
                    if depth >= max_depth {
                        continue;
                    }
                    for lp in graph.in_edges_of_type(party, EdgeType::LegalPerson) {
                        collector.node(lp.from)?;
                        collector.edge(lp.from, party, EdgeType::LegalPerson, &lp.properties);
                    }
                    for &e in graph.out_edges(party) {
                        let edge = graph.edge(e);
                        let other = edge.to;
                        if !edge.edge_type.is_party() || other == contract || visited.contains(&other) {
                            continue;
                        }
                        let disputed = graph
                            .out_edges_of_type(other, EdgeType::RelatedTo)
                            .next()
                            .is_some();
                        if disputed && !next.contains(&other) {
                            next.push(other);
                        }
                    }
                }
                // reversed so the first discovered contract is explored first
                stack.extend(next.into_iter().rev().map(|c| (c, depth + 1)));
            }
        }

        debug!(
            root = contract_id,
            nodes = collector.nodes.len(),
            edges = collector.edges.len(),
            "contract subgraph extracted"
        );
        Ok(ContractRiskSubgraph {
            root_contract_id: contract_id.to_string(),
            nodes: collector.nodes,
            edges: collector.edges,
            depth: max_depth,
        })
    }
}

impl Default for ContractSubgraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Analysis for ContractSubgraph {
    fn metadata(&self) -> &AnalysisMetadata {
        &self.metadata
    }
}

#[async_trait]
impl BatchAnalysis<SubgraphInput, SubgraphOutput> for ContractSubgraph {
    async fn execute(&self, input: SubgraphInput) -> Result<SubgraphOutput> {
        let start = Instant::now();
        let subgraph = Self::compute(&input.graph, &input.contract_id, input.max_depth)?;
        let compute_time_us = start.elapsed().as_micros() as u64;

        Ok(SubgraphOutput {
            subgraph,
            compute_time_us,
        })
    }
}
