//! Analysis registry.
//!
//! The registry holds the metadata of every available analysis and provides
//! lookup by id and by domain. Each analysis crate exposes a `register_all`
//! function that fills it.

use crate::analysis::AnalysisMetadata;
use crate::domain::Domain;
use crate::error::{AnalysisError, Result};
use hashbrown::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

/// Registry statistics.
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// Total number of registered analyses.
    pub total: usize,
    /// Number of iterative analyses.
    pub iterative: usize,
    /// Number of cancellable analyses.
    pub cancellable: usize,
    /// Analyses by domain.
    pub by_domain: HashMap<Domain, usize>,
}

/// Central registry for all analyses.
#[derive(Debug, Default)]
pub struct AnalysisRegistry {
    entries: RwLock<HashMap<String, AnalysisMetadata>>,
}

impl AnalysisRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register analysis metadata.
    pub fn register_metadata(&self, metadata: AnalysisMetadata) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        if entries.contains_key(&metadata.id) {
            return Err(AnalysisError::AnalysisAlreadyRegistered(metadata.id));
        }

        debug!(analysis_id = %metadata.id, domain = %metadata.domain, "Registering analysis");
        entries.insert(metadata.id.clone(), metadata);
        Ok(())
    }

    /// Get an analysis by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<AnalysisMetadata> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(id).cloned()
    }

    /// Get an analysis by ID or fail with `AnalysisNotFound`.
    pub fn require(&self, id: &str) -> Result<AnalysisMetadata> {
        self.get(id).ok_or_else(|| AnalysisError::not_found(id))
    }

    /// Check if an analysis exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(id)
    }

    /// All analysis IDs, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Analyses in a domain, sorted by id.
    #[must_use]
    pub fn by_domain(&self, domain: Domain) -> Vec<AnalysisMetadata> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut result: Vec<AnalysisMetadata> = entries
            .values()
            .filter(|meta| meta.domain == domain)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        result
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

        let mut stats = RegistryStats {
            total: entries.len(),
            ..Default::default()
        };
        for meta in entries.values() {
            *stats.by_domain.entry(meta.domain).or_default() += 1;
            if meta.iterative {
                stats.iterative += 1;
            }
            if meta.cancellable {
                stats.cancellable += 1;
            }
        }
        stats
    }

    /// Total number of registered analyses.
    #[must_use]
    pub fn total_count(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    /// Unregister an analysis by ID.
    pub fn unregister(&self, id: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let removed = entries.remove(id).is_some();
        if removed {
            info!(analysis_id = %id, "Unregistered analysis");
        }
        removed
    }
}
