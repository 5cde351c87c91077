//! Read-only edge similarity signal.
//!
//! Similarities come from an embedding model outside the engine. They are
//! computed once, before any analysis starts, and handed to the propagation
//! engine as an immutable map.

use graphrisk_core::error::{AnalysisError, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// `(from, to) -> similarity` in [0, 1].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimilarityMap {
    pairs: HashMap<(String, String), f64>,
}

impl SimilarityMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair. Values outside [0, 1] are rejected.
    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>, similarity: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&similarity) {
            return Err(AnalysisError::validation(format!(
                "similarity must be within [0, 1], got {}",
                similarity
            )));
        }
        self.pairs.insert((from.into(), to.into()), similarity);
        Ok(())
    }

    /// Similarity of a directed pair.
    pub fn get(&self, from: &str, to: &str) -> Option<f64> {
        self.pairs.get(&(from.to_string(), to.to_string())).copied()
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when no pair is known.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Parse a cache of `{"from|to": similarity}` entries.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, f64> = serde_json::from_str(json)?;
        let mut map = Self::new();
        for (key, similarity) in raw {
            let (from, to) = key.split_once('|').ok_or_else(|| {
                AnalysisError::validation(format!("similarity key '{}' is not 'from|to'", key))
            })?;
            map.insert(from, to, similarity)?;
        }
        Ok(map)
    }

    /// Load a JSON cache file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Serialize back to the cache format, keys sorted.
    pub fn to_json_string(&self) -> Result<String> {
        let raw: BTreeMap<String, f64> = self
            .pairs
            .iter()
            .map(|((from, to), s)| (format!("{}|{}", from, to), *s))
            .collect();
        Ok(serde_json::to_string_pretty(&raw)?)
    }
}
