//! # GraphRisk
//!
//! Graph risk analytics over a company, person and contract relationship graph.
//!
//! The engine loads a typed multigraph once, shares it behind an `Arc`, and runs
//! independent read-only analyses over it:
//!
//! - **Risk propagation**: legal event fraud rank and penalty/abnormal record
//!   risk rank, damped diffusion from seeded nodes
//! - **Circular trade**: bounded trade cycle search and fan-out/fan-in money flows
//! - **Entity clustering**: union-find shell clusters over shared controllers
//!   and per-company pass-through scoring
//! - **Collusion**: related-company communities rotating contract awards
//! - **Performance**: overdue transactions and same-subject contracts at risk
//! - **Investigation**: contract risk subgraphs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use graphrisk::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = SnapshotSource::from_path("snapshot.json")?;
//!     let graph = Arc::new(GraphLoader::new().load(&source)?);
//!
//!     let report = AnalysisSuite::new(EngineConfig::default()).run(graph).await?;
//!     if let Some(clusters) = report.shell_clusters.completed() {
//!         for cluster in clusters {
//!             println!("{} {:.3}", cluster.cluster_id, cluster.risk_score);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod suite;

// Re-export member crates
pub use graphrisk_compliance as compliance;
pub use graphrisk_core as core;
pub use graphrisk_graph as graph;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use graphrisk::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use graphrisk_core::prelude::*;

    // Graph model and sources
    pub use graphrisk_graph::graph::RiskGraph;
    pub use graphrisk_graph::similarity::SimilarityMap;
    pub use graphrisk_graph::source::{GraphLoader, GraphSource, QueryScope, SnapshotSource};
    pub use graphrisk_graph::types::{EdgeProperties, EdgeType, Node, NodeKind, NodeType};

    // Analyses
    pub use graphrisk_compliance::collusion::CollusionDetector;
    pub use graphrisk_compliance::fan_pattern::FanPatternDetector;
    pub use graphrisk_compliance::perform_risk::PerformRiskAnalysis;
    pub use graphrisk_compliance::rank::{ExternalRiskRank, FraudRank};
    pub use graphrisk_compliance::shell::ShellClusterDetector;
    pub use graphrisk_compliance::shell_company::ShellCompanyScorer;
    pub use graphrisk_graph::cycles::CycleSearch;
    pub use graphrisk_graph::propagation::RiskPropagation;
    pub use graphrisk_graph::subgraph::ContractSubgraph;

    // Suite
    pub use crate::suite::{AnalysisSuite, Outcome, SuiteReport};
}

/// Version information.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Catalog of the available analyses.
pub mod catalog {
    use graphrisk_core::analysis::AnalysisMetadata;
    use graphrisk_core::domain::Domain;
    use graphrisk_core::registry::AnalysisRegistry;

    /// Domain information.
    #[derive(Debug, Clone)]
    pub struct DomainInfo {
        /// Domain enum value.
        pub domain: Domain,
        /// Human-readable name.
        pub name: &'static str,
        /// Description.
        pub description: &'static str,
        /// Number of analyses.
        pub analysis_count: usize,
    }

    /// Get all domain information.
    pub fn domains() -> Vec<DomainInfo> {
        vec![
            DomainInfo {
                domain: Domain::RiskPropagation,
                name: "Risk Propagation",
                description: "Generic propagation, legal event fraud rank, external risk rank",
                analysis_count: 3,
            },
            DomainInfo {
                domain: Domain::CircularTrade,
                name: "Circular Trade",
                description: "Bounded trade cycle search, fan-out/fan-in money flows",
                analysis_count: 2,
            },
            DomainInfo {
                domain: Domain::EntityClustering,
                name: "Entity Clustering",
                description: "Shell clusters over shared legal persons, phones and staff, per-company shell scores",
                analysis_count: 2,
            },
            DomainInfo {
                domain: Domain::Collusion,
                name: "Collusion",
                description: "Related-company communities and bid rotation scoring",
                analysis_count: 1,
            },
            DomainInfo {
                domain: Domain::Investigation,
                name: "Investigation",
                description: "Contract risk subgraphs",
                analysis_count: 1,
            },
            DomainInfo {
                domain: Domain::Performance,
                name: "Performance",
                description: "Overdue contracts and same-subject contracts of related counterparties",
                analysis_count: 1,
            },
        ]
    }

    /// Get total analysis count across all domains.
    pub fn total_analysis_count() -> usize {
        domains().iter().map(|d| d.analysis_count).sum()
    }

    /// Metadata of every analysis, sorted by id.
    pub fn analyses() -> Vec<AnalysisMetadata> {
        let registry = AnalysisRegistry::new();
        if let Err(e) = super::register_all(&registry) {
            tracing::error!(error = %e, "catalog registration failed");
        }
        let mut analyses: Vec<AnalysisMetadata> = registry
            .ids()
            .iter()
            .filter_map(|id| registry.get(id))
            .collect();
        analyses.sort_by(|a, b| a.id.cmp(&b.id));
        analyses
    }
}

/// Register every analysis into a registry.
///
/// # Errors
///
/// Returns an error if any analysis is already registered.
pub fn register_all(
    registry: &graphrisk_core::registry::AnalysisRegistry,
) -> graphrisk_core::error::Result<()> {
    graphrisk_graph::register_all(registry)?;
    graphrisk_compliance::register_all(registry)?;
    Ok(())
}
