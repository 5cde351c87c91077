//! In-memory entity relationship graph.
//!
//! Nodes and edges live in insertion-ordered arenas addressed by dense
//! indices, so every traversal visits them in a reproducible order. Edge
//! endpoints that were never described are registered as stubs.

use crate::types::{Edge, EdgeIdx, EdgeProperties, EdgeType, Node, NodeIdx, NodeKind, NodeType};
use std::collections::HashMap;

/// Out-neighbour of a node as seen through one edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<'g> {
    /// Neighbour id.
    pub id: &'g str,
    /// Neighbour index.
    pub index: NodeIdx,
    /// Edge index.
    pub edge: EdgeIdx,
    /// Relation type.
    pub edge_type: EdgeType,
    /// Explicit edge weight, if supplied.
    pub weight: Option<f64>,
}

/// Directed multigraph of typed entities.
#[derive(Debug, Clone, Default)]
pub struct RiskGraph {
    nodes: Vec<Node>,
    index: HashMap<String, NodeIdx>,
    edges: Vec<Edge>,
    outgoing: Vec<Vec<EdgeIdx>>,
    incoming: Vec<Vec<EdgeIdx>>,
}

impl RiskGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node, upgrading a stub with the same id.
    ///
    /// A described node replaces an earlier stub; describing an already
    /// described node keeps the latest description.
    pub fn add_node(&mut self, node: Node) -> NodeIdx {
        match self.index.get(&node.id) {
            Some(&idx) => {
                if !matches!(node.kind, NodeKind::Stub) {
                    self.nodes[idx].kind = node.kind;
                }
                idx
            }
            None => self.push_node(node),
        }
    }

    /// Index of `id`, registering a stub if it is unknown.
    pub fn ensure_node(&mut self, id: &str) -> NodeIdx {
        match self.index.get(id) {
            Some(&idx) => idx,
            None => self.push_node(Node::stub(id)),
        }
    }

    fn push_node(&mut self, node: Node) -> NodeIdx {
        let idx = self.nodes.len();
        self.index.insert(node.id.clone(), idx);
        self.nodes.push(node);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        idx
    }

    /// Add a directed edge without properties.
    pub fn add_edge(
        &mut self,
        from: &str,
        to: &str,
        edge_type: EdgeType,
        weight: Option<f64>,
    ) -> EdgeIdx {
        self.add_edge_with(from, to, edge_type, weight, EdgeProperties::default())
    }

    /// Add a directed edge. Parallel edges are kept; each call counts once
    /// towards the out-degree of `from`.
    pub fn add_edge_with(
        &mut self,
        from: &str,
        to: &str,
        edge_type: EdgeType,
        weight: Option<f64>,
        properties: EdgeProperties,
    ) -> EdgeIdx {
        let from_idx = self.ensure_node(from);
        let to_idx = self.ensure_node(to);
        let idx = self.edges.len();
        self.edges.push(Edge {
            from: from_idx,
            to: to_idx,
            edge_type,
            weight,
            properties,
        });
        self.outgoing[from_idx].push(idx);
        self.incoming[to_idx].push(idx);
        idx
    }

    /// Index of a node id.
    pub fn index_of(&self, id: &str) -> Option<NodeIdx> {
        self.index.get(id).copied()
    }

    /// Node by id.
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|idx| &self.nodes[idx])
    }

    /// Node by index.
    ///
    /// # Panics
    ///
    /// Panics if `idx` was not issued by this graph.
    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx]
    }

    /// Edge by index.
    ///
    /// # Panics
    ///
    /// Panics if `idx` was not issued by this graph.
    pub fn edge(&self, idx: EdgeIdx) -> &Edge {
        &self.edges[idx]
    }

    /// Id of the node at `idx`.
    pub fn id(&self, idx: NodeIdx) -> &str {
        &self.nodes[idx].id
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of nodes, stubs included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// True when the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Out-neighbours of `id` in insertion order; empty for unknown ids.
    pub fn neighbors<'g>(&'g self, id: &str) -> impl Iterator<Item = Neighbor<'g>> + 'g {
        let edges: &'g [EdgeIdx] = match self.index_of(id) {
            Some(idx) => &self.outgoing[idx],
            None => &[],
        };
        edges.iter().map(move |&e| {
            let edge = &self.edges[e];
            Neighbor {
                id: &self.nodes[edge.to].id,
                index: edge.to,
                edge: e,
                edge_type: edge.edge_type,
                weight: edge.weight,
            }
        })
    }

    /// In-neighbours of `id` (the sources of its incoming edges).
    pub fn incoming<'g>(&'g self, id: &str) -> impl Iterator<Item = Neighbor<'g>> + 'g {
        let edges: &'g [EdgeIdx] = match self.index_of(id) {
            Some(idx) => &self.incoming[idx],
            None => &[],
        };
        edges.iter().map(move |&e| {
            let edge = &self.edges[e];
            Neighbor {
                id: &self.nodes[edge.from].id,
                index: edge.from,
                edge: e,
                edge_type: edge.edge_type,
                weight: edge.weight,
            }
        })
    }

    /// Outgoing edge indices of a node.
    pub fn out_edges(&self, idx: NodeIdx) -> &[EdgeIdx] {
        &self.outgoing[idx]
    }

    /// Incoming edge indices of a node.
    pub fn in_edges(&self, idx: NodeIdx) -> &[EdgeIdx] {
        &self.incoming[idx]
    }

    /// Outgoing edges of one type.
    pub fn out_edges_of_type(
        &self,
        idx: NodeIdx,
        edge_type: EdgeType,
    ) -> impl Iterator<Item = &Edge> + '_ {
        self.outgoing[idx]
            .iter()
            .map(move |&e| &self.edges[e])
            .filter(move |e| e.edge_type == edge_type)
    }

    /// Incoming edges of one type.
    pub fn in_edges_of_type(
        &self,
        idx: NodeIdx,
        edge_type: EdgeType,
    ) -> impl Iterator<Item = &Edge> + '_ {
        self.incoming[idx]
            .iter()
            .map(move |&e| &self.edges[e])
            .filter(move |e| e.edge_type == edge_type)
    }

    /// Number of edges leaving `id`; 0 for unknown ids and sinks.
    pub fn out_degree(&self, id: &str) -> usize {
        self.index_of(id).map_or(0, |idx| self.outgoing[idx].len())
    }

    /// Number of edges leaving the node at `idx`.
    pub fn out_degree_at(&self, idx: NodeIdx) -> usize {
        self.outgoing[idx].len()
    }

    /// All edges of one type in insertion order.
    pub fn edges_of_type(&self, edge_type: EdgeType) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.edge_type == edge_type)
    }

    /// All nodes of one type with their indices.
    pub fn nodes_of_type(
        &self,
        node_type: NodeType,
    ) -> impl Iterator<Item = (NodeIdx, &Node)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.node_type() == Some(node_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CompanyAttrs;

    fn company(id: &str) -> Node {
        Node::company(
            id,
            CompanyAttrs {
                name: format!("{} Ltd", id),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_edges_stub_unknown_endpoints() {
        let mut graph = RiskGraph::new();
        graph.add_edge("A", "B", EdgeType::Controls, None);

        assert_eq!(graph.node_count(), 2);
        assert!(graph.get("A").unwrap().is_stub());
        assert!(graph.get("B").unwrap().is_stub());
    }

    #[test]
    fn test_add_node_upgrades_stub() {
        let mut graph = RiskGraph::new();
        graph.add_edge("A", "B", EdgeType::Controls, None);
        let idx = graph.add_node(company("A"));

        assert_eq!(idx, 0);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node(idx).node_type(), Some(NodeType::Company));

        // a later stub never downgrades
        graph.add_node(Node::stub("A"));
        assert!(!graph.get("A").unwrap().is_stub());
    }

    #[test]
    fn test_out_degree_counts_every_edge() {
        let mut graph = RiskGraph::new();
        graph.add_edge("A", "B", EdgeType::TradesWith, None);
        graph.add_edge("A", "B", EdgeType::TradesWith, None);
        graph.add_edge("A", "C", EdgeType::Controls, Some(0.9));
        graph.add_edge("B", "C", EdgeType::Pays, None);
        graph.add_edge("C", "C", EdgeType::TradesWith, None);

        assert_eq!(graph.out_degree("A"), 3);
        assert_eq!(graph.out_degree("C"), 1);
        assert_eq!(graph.out_degree("missing"), 0);

        let total: usize = graph.nodes().iter().map(|n| graph.out_degree(&n.id)).sum();
        assert_eq!(total, graph.edge_count());
        assert_eq!(total, 5);
    }

    #[test]
    fn test_neighbors_in_insertion_order() {
        let mut graph = RiskGraph::new();
        graph.add_edge("A", "C", EdgeType::Controls, Some(0.4));
        graph.add_edge("A", "B", EdgeType::TradesWith, None);

        let neighbors: Vec<_> = graph.neighbors("A").map(|n| (n.id, n.weight)).collect();
        assert_eq!(neighbors, vec![("C", Some(0.4)), ("B", None)]);
        assert_eq!(graph.neighbors("B").count(), 0);
        assert_eq!(graph.neighbors("nobody").count(), 0);

        let incoming: Vec<_> = graph.incoming("B").map(|n| n.id).collect();
        assert_eq!(incoming, vec!["A"]);
    }

    #[test]
    fn test_typed_iteration() {
        let mut graph = RiskGraph::new();
        graph.add_node(company("A"));
        graph.add_node(company("B"));
        graph.add_edge("A", "B", EdgeType::Controls, None);
        graph.add_edge("A", "B", EdgeType::TradesWith, None);
        graph.add_edge("B", "X", EdgeType::TradesWith, None);

        assert_eq!(graph.edges_of_type(EdgeType::TradesWith).count(), 2);
        assert_eq!(graph.nodes_of_type(NodeType::Company).count(), 2);

        let a = graph.index_of("A").unwrap();
        assert_eq!(graph.out_edges_of_type(a, EdgeType::Controls).count(), 1);
        let b = graph.index_of("B").unwrap();
        assert_eq!(graph.in_edges_of_type(b, EdgeType::TradesWith).count(), 1);
    }
}
