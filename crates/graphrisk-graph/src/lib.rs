//! # GraphRisk Graph
//!
//! Entity relationship graph and the graph-level risk analyses.
//!
//! ## Model
//! - `RiskGraph` - insertion-ordered directed multigraph of typed entities
//! - `GraphSource` / `GraphLoader` - store boundary and graph construction
//! - `SnapshotSource` - JSON snapshot source
//! - `SimilarityMap` - read-only edge similarity signal
//!
//! ## Analyses
//! - `RiskPropagation` - seeded damped diffusion, iterative
//! - `CycleSearch` - bounded circular trade search, cancellable
//! - `ContractSubgraph` - legal event context around a contract

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cycles;
pub mod graph;
pub mod messages;
pub mod propagation;
pub mod similarity;
pub mod source;
pub mod subgraph;

// Common graph types
pub mod types;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::cycles::*;
    pub use crate::graph::*;
    pub use crate::messages::*;
    pub use crate::propagation::*;
    pub use crate::similarity::*;
    pub use crate::source::*;
    pub use crate::subgraph::*;
    pub use crate::types::*;
}

/// Register all graph analyses with a registry.
pub fn register_all(
    registry: &graphrisk_core::registry::AnalysisRegistry,
) -> graphrisk_core::error::Result<()> {
    use graphrisk_core::traits::Analysis;

    tracing::info!("Registering graph analyses");

    registry.register_metadata(propagation::RiskPropagation::new().metadata().clone())?;
    registry.register_metadata(cycles::CycleSearch::new().metadata().clone())?;
    registry.register_metadata(subgraph::ContractSubgraph::new().metadata().clone())?;

    tracing::info!("Registered 3 graph analyses");
    Ok(())
}
