//! Batch input and output types for graph analyses.

use crate::cycles::CycleSearchResult;
use crate::graph::RiskGraph;
use crate::propagation::{PropagationResult, SeedScores};
use crate::similarity::SimilarityMap;
use crate::subgraph::{ContractRiskSubgraph, DEFAULT_SUBGRAPH_DEPTH};
use graphrisk_core::cancel::CancellationToken;
use graphrisk_core::config::{CycleConfig, PropagationConfig};
use serde::Serialize;
use std::sync::Arc;

// ============================================================================
// Risk Propagation
// ============================================================================

/// Input for risk propagation.
#[derive(Debug, Clone)]
pub struct PropagationInput {
    /// Shared graph.
    pub graph: Arc<RiskGraph>,
    /// Initial scores.
    pub seeds: SeedScores,
    /// Diffusion parameters.
    pub config: PropagationConfig,
    /// Optional similarity signal.
    pub similarity: Option<Arc<SimilarityMap>>,
    /// Cancellation token.
    pub cancel: CancellationToken,
}

impl PropagationInput {
    /// Input with default parameters.
    pub fn new(graph: Arc<RiskGraph>, seeds: SeedScores) -> Self {
        Self {
            graph,
            seeds,
            config: PropagationConfig::default(),
            similarity: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set parameters.
    pub fn with_config(mut self, config: PropagationConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach a similarity signal.
    pub fn with_similarity(mut self, similarity: Arc<SimilarityMap>) -> Self {
        self.similarity = Some(similarity);
        self
    }
}

/// Output from risk propagation.
#[derive(Debug, Clone, Serialize)]
pub struct PropagationOutput {
    /// Scores and convergence.
    pub result: PropagationResult,
    /// Computation time in microseconds.
    pub compute_time_us: u64,
}

// ============================================================================
// Cycle Search
// ============================================================================

/// Input for trade cycle search.
#[derive(Debug, Clone)]
pub struct CycleSearchInput {
    /// Shared graph.
    pub graph: Arc<RiskGraph>,
    /// Search parameters.
    pub config: CycleConfig,
    /// Restrict the roots of the search.
    pub start_nodes: Option<Vec<String>>,
    /// Cancellation token.
    pub cancel: CancellationToken,
}

impl CycleSearchInput {
    /// Input with default parameters.
    pub fn new(graph: Arc<RiskGraph>) -> Self {
        Self {
            graph,
            config: CycleConfig::default(),
            start_nodes: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set parameters.
    pub fn with_config(mut self, config: CycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Only search from these nodes.
    pub fn with_start_nodes(mut self, ids: Vec<String>) -> Self {
        self.start_nodes = Some(ids);
        self
    }

    /// Use a caller-owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Output from trade cycle search.
#[derive(Debug, Clone, Serialize)]
pub struct CycleSearchOutput {
    /// Cycles found.
    pub result: CycleSearchResult,
    /// Computation time in microseconds.
    pub compute_time_us: u64,
}

// ============================================================================
// Contract Subgraph
// ============================================================================

/// Input for contract subgraph extraction.
#[derive(Debug, Clone)]
pub struct SubgraphInput {
    /// Shared graph.
    pub graph: Arc<RiskGraph>,
    /// Root contract.
    pub contract_id: String,
    /// Depth bound.
    pub max_depth: usize,
}

impl SubgraphInput {
    /// Input with the default depth.
    pub fn new(graph: Arc<RiskGraph>, contract_id: impl Into<String>) -> Self {
        Self {
            graph,
            contract_id: contract_id.into(),
            max_depth: DEFAULT_SUBGRAPH_DEPTH,
        }
    }
}

/// Output from contract subgraph extraction.
#[derive(Debug, Clone, Serialize)]
pub struct SubgraphOutput {
    /// The subgraph.
    pub subgraph: ContractRiskSubgraph,
    /// Computation time in microseconds.
    pub compute_time_us: u64,
}
