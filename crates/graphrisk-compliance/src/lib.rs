//! # GraphRisk Compliance
//!
//! Company-level risk analyses built on the entity graph.
//!
//! ## Risk Rank
//! - `FraudRank` - legal event seeded propagation with company ranking
//! - `ExternalRiskRank` - penalty and abnormal listing seeded propagation
//!
//! ## Circular Trade
//! - `FanPatternDetector` - fan-out/fan-in money flows within sliding windows
//!
//! ## Entity Clustering
//! - `ShellClusterDetector` - union-find clustering with shell entity scoring
//! - `ShellCompanyScorer` - per-company pass-through and ownership scoring
//!
//! ## Collusion
//! - `CollusionDetector` - related-company communities scored for bid collusion
//!
//! ## Performance
//! - `PerformRiskAnalysis` - overdue transactions and same-subject contracts at risk

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collusion;
pub mod fan_pattern;
pub mod messages;
pub mod perform_risk;
pub mod rank;
pub mod relations;
pub mod seeds;
pub mod shell;
pub mod shell_company;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::collusion::*;
    pub use crate::fan_pattern::*;
    pub use crate::messages::*;
    pub use crate::perform_risk::*;
    pub use crate::rank::*;
    pub use crate::seeds::*;
    pub use crate::shell::*;
    pub use crate::shell_company::*;
}

/// Register all compliance analyses with a registry.
pub fn register_all(
    registry: &graphrisk_core::registry::AnalysisRegistry,
) -> graphrisk_core::error::Result<()> {
    use graphrisk_core::traits::Analysis;

    tracing::info!("Registering compliance analyses");

    // Risk rank
    registry.register_metadata(rank::FraudRank::new().metadata().clone())?;
    registry.register_metadata(rank::ExternalRiskRank::new().metadata().clone())?;

    // Detectors
    registry.register_metadata(fan_pattern::FanPatternDetector::new().metadata().clone())?;
    registry.register_metadata(shell::ShellClusterDetector::new().metadata().clone())?;
    registry.register_metadata(shell_company::ShellCompanyScorer::new().metadata().clone())?;
    registry.register_metadata(collusion::CollusionDetector::new().metadata().clone())?;
    registry.register_metadata(perform_risk::PerformRiskAnalysis::new().metadata().clone())?;

    tracing::info!("Registered 7 compliance analyses");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphrisk_core::registry::AnalysisRegistry;

    #[test]
    fn test_register_all() {
        let registry = AnalysisRegistry::new();
        register_all(&registry).expect("Failed to register compliance analyses");
        assert_eq!(registry.total_count(), 7);
    }

    #[test]
    fn test_register_all_by_domain() {
        use graphrisk_core::domain::Domain;

        let registry = AnalysisRegistry::new();
        register_all(&registry).expect("Failed to register compliance analyses");

        assert_eq!(registry.by_domain(Domain::RiskPropagation).len(), 2);
        assert_eq!(registry.by_domain(Domain::CircularTrade).len(), 1);
        assert_eq!(registry.by_domain(Domain::EntityClustering).len(), 2);
        assert_eq!(registry.by_domain(Domain::Collusion).len(), 1);
        assert_eq!(registry.by_domain(Domain::Performance).len(), 1);
    }

    #[test]
    fn test_register_twice_fails() {
        let registry = AnalysisRegistry::new();
        register_all(&registry).unwrap();
        assert!(register_all(&registry).is_err());
    }
}
