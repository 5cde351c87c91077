//! Graph store boundary and graph loading.
//!
//! A [`GraphSource`] answers two questions: which edges of a type exist in a
//! scope, and what is known about a set of node ids. [`GraphLoader`] turns
//! those answers into a [`RiskGraph`]. [`SnapshotSource`] is the in-memory
//! source backed by a JSON snapshot.

use crate::graph::RiskGraph;
use crate::types::{EdgeProperties, EdgeType, Node};
use graphrisk_core::config::DateWindow;
use graphrisk_core::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Restriction applied to an edge query.
#[derive(Debug, Clone, Default)]
pub struct QueryScope {
    /// Only edges dated inside this window (undated edges always match).
    pub window: Option<DateWindow>,
    /// Only edges touching one of these node ids.
    pub node_filter: Option<HashSet<String>>,
}

impl QueryScope {
    /// Unrestricted scope.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a date window.
    pub fn with_window(mut self, window: DateWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Restrict to edges touching the given ids.
    pub fn with_nodes<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node_filter = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Check whether an edge falls inside the scope.
    pub fn admits(&self, from: &str, to: &str, properties: &EdgeProperties) -> bool {
        let in_window = match (self.window, properties.date) {
            (Some(window), Some(date)) => window.contains(date),
            _ => true,
        };
        let touches = self
            .node_filter
            .as_ref()
            .map_or(true, |ids| ids.contains(from) || ids.contains(to));
        in_window && touches
    }
}

/// One edge as returned by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Source node id.
    pub from: String,
    /// Target node id.
    pub to: String,
    /// Explicit propagation weight.
    #[serde(default)]
    pub weight: Option<f64>,
    /// Descriptive properties.
    #[serde(default)]
    pub properties: EdgeProperties,
}

/// Graph store collaborator.
pub trait GraphSource: Send + Sync {
    /// Edges of one type inside a scope.
    fn edges(&self, edge_type: EdgeType, scope: &QueryScope) -> Result<Vec<EdgeRecord>>;

    /// Descriptions of the requested nodes. Unknown ids are omitted.
    fn nodes(&self, ids: &[String]) -> Result<Vec<Node>>;
}

// ============================================================================
// Snapshot Source
// ============================================================================

/// Edge entry of a JSON snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    /// Source node id.
    pub from: String,
    /// Target node id.
    pub to: String,
    /// Relation type.
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    /// Explicit propagation weight.
    #[serde(default)]
    pub weight: Option<f64>,
    /// Descriptive properties.
    #[serde(default)]
    pub properties: EdgeProperties,
}

/// In-memory graph source loaded from a JSON snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSource {
    /// Described nodes.
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Edges of every type.
    #[serde(default)]
    pub edges: Vec<SnapshotEdge>,
}

impl SnapshotSource {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a snapshot from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a snapshot from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Serialize the snapshot to pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Add a node.
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add an edge.
    pub fn with_edge(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        edge_type: EdgeType,
        properties: EdgeProperties,
    ) -> Self {
        self.edges.push(SnapshotEdge {
            from: from.into(),
            to: to.into(),
            edge_type,
            weight: None,
            properties,
        });
        self
    }
}

impl GraphSource for SnapshotSource {
    fn edges(&self, edge_type: EdgeType, scope: &QueryScope) -> Result<Vec<EdgeRecord>> {
        Ok(self
            .edges
            .iter()
            .filter(|e| e.edge_type == edge_type)
            .filter(|e| scope.admits(&e.from, &e.to, &e.properties))
            .map(|e| EdgeRecord {
                from: e.from.clone(),
                to: e.to.clone(),
                weight: e.weight,
                properties: e.properties.clone(),
            })
            .collect())
    }

    fn nodes(&self, ids: &[String]) -> Result<Vec<Node>> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        Ok(self
            .nodes
            .iter()
            .filter(|n| wanted.contains(n.id.as_str()))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Builds a [`RiskGraph`] from a [`GraphSource`].
#[derive(Debug, Clone)]
pub struct GraphLoader {
    edge_types: Vec<EdgeType>,
    scope: QueryScope,
    derive_has_party: bool,
}

impl Default for GraphLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphLoader {
    /// Loader for every edge type, unrestricted, deriving HAS_PARTY edges.
    #[must_use]
    pub fn new() -> Self {
        Self {
            edge_types: EdgeType::ALL.to_vec(),
            scope: QueryScope::all(),
            derive_has_party: true,
        }
    }

    /// Only load these edge types.
    pub fn with_edge_types(mut self, edge_types: &[EdgeType]) -> Self {
        self.edge_types = edge_types.to_vec();
        self
    }

    /// Restrict every edge query.
    pub fn with_scope(mut self, scope: QueryScope) -> Self {
        self.scope = scope;
        self
    }

    /// Toggle deriving Contract -> Company HAS_PARTY edges from party edges.
    pub fn derive_has_party(mut self, enabled: bool) -> Self {
        self.derive_has_party = enabled;
        self
    }

    /// Query the source and build the graph.
    ///
    /// Records with an empty endpoint are skipped; weights outside [0, 1]
    /// are clamped.
    pub fn load(&self, source: &dyn GraphSource) -> Result<RiskGraph> {
        let mut graph = RiskGraph::new();
        let mut skipped = 0usize;

        for &edge_type in &self.edge_types {
            let records = source
                .edges(edge_type, &self.scope)
                .map_err(|e| match e {
                    AnalysisError::SourceError(_) => e,
                    other => AnalysisError::source(format!("{}: {}", edge_type, other)),
                })?;
            debug!(edge_type = %edge_type, count = records.len(), "loaded edges");

            for record in records {
                if record.from.is_empty() || record.to.is_empty() {
                    skipped += 1;
                    continue;
                }
                let weight = record.weight.map(|w| {
                    if !(0.0..=1.0).contains(&w) {
                        warn!(from = %record.from, to = %record.to, weight = w, "edge weight clamped");
                    }
                    graphrisk_core::stats::clamp_unit(w)
                });
                graph.add_edge_with(&record.from, &record.to, edge_type, weight, record.properties);
            }
        }

        if skipped > 0 {
            warn!(skipped, "edge records without endpoints skipped");
        }

        if self.derive_has_party && graph.edges_of_type(EdgeType::HasParty).next().is_none() {
            let reverse: Vec<(String, String)> = graph
                .edges()
                .iter()
                .filter(|e| e.edge_type.is_party())
                .map(|e| (graph.id(e.to).to_string(), graph.id(e.from).to_string()))
                .collect();
            debug!(count = reverse.len(), "derived HAS_PARTY edges");
            for (contract, company) in reverse {
                graph.add_edge(&contract, &company, EdgeType::HasParty, None);
            }
        }

        let ids: Vec<String> = graph.nodes().iter().map(|n| n.id.clone()).collect();
        for node in source.nodes(&ids)? {
            graph.add_node(node);
        }

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "graph loaded"
        );
        Ok(graph)
    }
}
