//! Batch input and output types for compliance analyses.

use crate::collusion::CollusionCommunity;
use crate::fan_pattern::FlowPattern;
use crate::perform_risk::PerformRiskReport;
use crate::rank::RiskRanking;
use crate::seeds::ExternalSources;
use crate::shell::ShellCluster;
use crate::shell_company::ShellCompanyReport;
use chrono::NaiveDate;
use graphrisk_core::cancel::CancellationToken;
use graphrisk_core::config::{
    CollusionConfig, DateWindow, ExternalRiskConfig, FanPatternConfig, FraudRankConfig,
    PerformRiskConfig, ShellClusterConfig, ShellCompanyConfig,
};
use graphrisk_graph::graph::RiskGraph;
use graphrisk_graph::similarity::SimilarityMap;
use serde::Serialize;
use std::sync::Arc;

// ============================================================================
// Risk Rank
// ============================================================================

/// Input for fraud rank.
#[derive(Debug, Clone)]
pub struct FraudRankInput {
    /// Shared graph.
    pub graph: Arc<RiskGraph>,
    /// Seed and diffusion parameters.
    pub config: FraudRankConfig,
    /// Optional similarity signal.
    pub similarity: Option<Arc<SimilarityMap>>,
    /// Cancellation token.
    pub cancel: CancellationToken,
}

impl FraudRankInput {
    /// Input with default parameters.
    pub fn new(graph: Arc<RiskGraph>) -> Self {
        Self {
            graph,
            config: FraudRankConfig::default(),
            similarity: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set parameters.
    pub fn with_config(mut self, config: FraudRankConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach a similarity signal.
    pub fn with_similarity(mut self, similarity: Arc<SimilarityMap>) -> Self {
        self.similarity = Some(similarity);
        self
    }

    /// Use a caller-owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Input for external risk rank.
#[derive(Debug, Clone)]
pub struct ExternalRiskInput {
    /// Shared graph.
    pub graph: Arc<RiskGraph>,
    /// Seed and diffusion parameters.
    pub config: ExternalRiskConfig,
    /// Which records seed.
    pub sources: ExternalSources,
    /// Only records dated inside this window seed.
    pub window: Option<DateWindow>,
    /// Optional similarity signal.
    pub similarity: Option<Arc<SimilarityMap>>,
    /// Cancellation token.
    pub cancel: CancellationToken,
}

impl ExternalRiskInput {
    /// Input with default parameters.
    pub fn new(graph: Arc<RiskGraph>) -> Self {
        Self {
            graph,
            config: ExternalRiskConfig::default(),
            sources: ExternalSources::All,
            window: None,
            similarity: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set parameters.
    pub fn with_config(mut self, config: ExternalRiskConfig) -> Self {
        self.config = config;
        self
    }

    /// Restrict seeding records.
    pub fn with_sources(mut self, sources: ExternalSources) -> Self {
        self.sources = sources;
        self
    }

    /// Restrict seeding records to a date window.
    pub fn with_window(mut self, window: DateWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Attach a similarity signal.
    pub fn with_similarity(mut self, similarity: Arc<SimilarityMap>) -> Self {
        self.similarity = Some(similarity);
        self
    }

    /// Use a caller-owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Output from either risk rank.
#[derive(Debug, Clone, Serialize)]
pub struct RankOutput {
    /// Scores and report.
    pub ranking: RiskRanking,
    /// Computation time in microseconds.
    pub compute_time_us: u64,
}

// ============================================================================
// Fan Pattern
// ============================================================================

/// Input for fan-out/fan-in detection.
#[derive(Debug, Clone)]
pub struct FanPatternInput {
    /// Shared graph.
    pub graph: Arc<RiskGraph>,
    /// Detection parameters.
    pub config: FanPatternConfig,
    /// Cancellation token.
    pub cancel: CancellationToken,
}

impl FanPatternInput {
    /// Input with default parameters.
    pub fn new(graph: Arc<RiskGraph>) -> Self {
        Self {
            graph,
            config: FanPatternConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Set parameters.
    pub fn with_config(mut self, config: FanPatternConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a caller-owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Output from fan-out/fan-in detection.
#[derive(Debug, Clone, Serialize)]
pub struct FanPatternOutput {
    /// Patterns, highest risk first.
    pub patterns: Vec<FlowPattern>,
    /// Computation time in microseconds.
    pub compute_time_us: u64,
}

// ============================================================================
// Shell Clusters
// ============================================================================

/// Input for shell cluster detection.
#[derive(Debug, Clone)]
pub struct ShellClusterInput {
    /// Shared graph.
    pub graph: Arc<RiskGraph>,
    /// Detection parameters.
    pub config: ShellClusterConfig,
}

impl ShellClusterInput {
    /// Input with default parameters.
    pub fn new(graph: Arc<RiskGraph>) -> Self {
        Self {
            graph,
            config: ShellClusterConfig::default(),
        }
    }

    /// Set parameters.
    pub fn with_config(mut self, config: ShellClusterConfig) -> Self {
        self.config = config;
        self
    }
}

/// Output from shell cluster detection.
#[derive(Debug, Clone, Serialize)]
pub struct ShellClusterOutput {
    /// Clusters, highest risk first.
    pub clusters: Vec<ShellCluster>,
    /// Computation time in microseconds.
    pub compute_time_us: u64,
}

// ============================================================================
// Shell Companies
// ============================================================================

/// Input for per-company shell scoring.
#[derive(Debug, Clone)]
pub struct ShellCompanyInput {
    /// Shared graph.
    pub graph: Arc<RiskGraph>,
    /// Scoring parameters.
    pub config: ShellCompanyConfig,
}

impl ShellCompanyInput {
    /// Input with default parameters.
    pub fn new(graph: Arc<RiskGraph>) -> Self {
        Self {
            graph,
            config: ShellCompanyConfig::default(),
        }
    }

    /// Set parameters.
    pub fn with_config(mut self, config: ShellCompanyConfig) -> Self {
        self.config = config;
        self
    }
}

/// Output from per-company shell scoring.
#[derive(Debug, Clone, Serialize)]
pub struct ShellCompanyOutput {
    /// Scored companies and networks.
    pub report: ShellCompanyReport,
    /// Computation time in microseconds.
    pub compute_time_us: u64,
}

// ============================================================================
// Collusion
// ============================================================================

/// Input for collusion detection.
#[derive(Debug, Clone)]
pub struct CollusionInput {
    /// Shared graph.
    pub graph: Arc<RiskGraph>,
    /// Detection parameters.
    pub config: CollusionConfig,
}

impl CollusionInput {
    /// Input with default parameters.
    pub fn new(graph: Arc<RiskGraph>) -> Self {
        Self {
            graph,
            config: CollusionConfig::default(),
        }
    }

    /// Set parameters.
    pub fn with_config(mut self, config: CollusionConfig) -> Self {
        self.config = config;
        self
    }
}

/// Output from collusion detection.
#[derive(Debug, Clone, Serialize)]
pub struct CollusionOutput {
    /// Communities in discovery order.
    pub communities: Vec<CollusionCommunity>,
    /// Computation time in microseconds.
    pub compute_time_us: u64,
}

// ============================================================================
// Performance Risk
// ============================================================================

/// Input for performance risk analysis.
#[derive(Debug, Clone)]
pub struct PerformRiskInput {
    /// Shared graph.
    pub graph: Arc<RiskGraph>,
    /// Scoring parameters.
    pub config: PerformRiskConfig,
    /// Reference date for due dates.
    pub as_of: NaiveDate,
    /// Only these company ids are charged and ranked.
    pub companies: Option<Vec<String>>,
    /// Only transactions dated inside this window count.
    pub window: Option<DateWindow>,
}

impl PerformRiskInput {
    /// Input with default parameters.
    pub fn new(graph: Arc<RiskGraph>, as_of: NaiveDate) -> Self {
        Self {
            graph,
            config: PerformRiskConfig::default(),
            as_of,
            companies: None,
            window: None,
        }
    }

    /// Set parameters.
    pub fn with_config(mut self, config: PerformRiskConfig) -> Self {
        self.config = config;
        self
    }

    /// Restrict to some companies.
    pub fn with_companies(mut self, companies: Vec<String>) -> Self {
        self.companies = Some(companies);
        self
    }

    /// Restrict transactions to a date window.
    pub fn with_window(mut self, window: DateWindow) -> Self {
        self.window = Some(window);
        self
    }
}

/// Output from performance risk analysis.
#[derive(Debug, Clone, Serialize)]
pub struct PerformRiskOutput {
    /// Overdue records and ranked companies.
    pub report: PerformRiskReport,
    /// Computation time in microseconds.
    pub compute_time_us: u64,
}
