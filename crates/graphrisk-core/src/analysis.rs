//! Analysis metadata.
//!
//! Every analysis carries an [`AnalysisMetadata`] describing its identifier,
//! domain and runtime characteristics. The registry and the CLI catalog are
//! built from this metadata.

use crate::domain::Domain;
use serde::{Deserialize, Serialize};

/// Metadata describing one analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Unique analysis identifier (e.g., "propagation/fraud-rank").
    pub id: String,

    /// Risk domain.
    pub domain: Domain,

    /// Human-readable description.
    pub description: String,

    /// Whether the analysis iterates to a convergence threshold.
    pub iterative: bool,

    /// Whether the analysis observes a cancellation token.
    pub cancellable: bool,

    /// Version of the scoring model.
    pub version: u32,
}

impl AnalysisMetadata {
    /// Create metadata for a single-pass batch analysis.
    #[must_use]
    pub fn batch(id: impl Into<String>, domain: Domain) -> Self {
        Self {
            id: id.into(),
            domain,
            description: String::new(),
            iterative: false,
            cancellable: false,
            version: 1,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark the analysis as iterating to convergence.
    #[must_use]
    pub fn iterative(mut self) -> Self {
        self.iterative = true;
        self
    }

    /// Mark the analysis as honouring cancellation.
    #[must_use]
    pub fn cancellable(mut self) -> Self {
        self.cancellable = true;
        self
    }

    /// Set the version.
    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Returns the last path segment of the id (e.g., "fraud-rank").
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }
}

impl Default for AnalysisMetadata {
    fn default() -> Self {
        Self::batch("unnamed", Domain::Investigation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let meta = AnalysisMetadata::batch("propagation/fraud-rank", Domain::RiskPropagation)
            .with_description("Fraud rank")
            .iterative()
            .with_version(2);

        assert_eq!(meta.id, "propagation/fraud-rank");
        assert!(meta.iterative);
        assert!(!meta.cancellable);
        assert_eq!(meta.version, 2);
        assert_eq!(meta.short_name(), "fraud-rank");
    }

    #[test]
    fn test_short_name_without_separator() {
        let meta = AnalysisMetadata::batch("standalone", Domain::Collusion);
        assert_eq!(meta.short_name(), "standalone");
    }
}
