//! Error types for the graph risk analytics engine.

use thiserror::Error;

/// Result type alias using `AnalysisError`.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors that can occur while configuring or running an analysis.
///
/// Empty results are never errors: an analysis that finds nothing returns an
/// empty collection.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Analysis not found in registry.
    #[error("Analysis not found: {0}")]
    AnalysisNotFound(String),

    /// Analysis already registered.
    #[error("Analysis already registered: {0}")]
    AnalysisAlreadyRegistered(String),

    /// Input validation failed.
    #[error("Input validation failed: {0}")]
    ValidationError(String),

    /// Configuration rejected before computation started.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The run was cancelled through its cancellation token.
    #[error("Analysis cancelled: {0}")]
    Cancelled(String),

    /// Timeout waiting for an analysis to finish.
    #[error("Timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// The graph source collaborator failed.
    #[error("Graph source error: {0}")]
    SourceError(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    InternalError(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AnalysisError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        AnalysisError::ValidationError(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        AnalysisError::ConfigError(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        AnalysisError::InternalError(msg.into())
    }

    /// Create a graph source error.
    #[must_use]
    pub fn source(msg: impl Into<String>) -> Self {
        AnalysisError::SourceError(msg.into())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        AnalysisError::AnalysisNotFound(id.into())
    }

    /// Returns true if the run was stopped rather than failed.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            AnalysisError::Cancelled(_) | AnalysisError::Timeout(_)
        )
    }

    /// Returns true if this error was raised by configuration validation.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, AnalysisError::ConfigError(_))
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_helpers() {
        let err = AnalysisError::validation("bad input");
        assert_eq!(err.to_string(), "Input validation failed: bad input");
        assert!(!err.is_interrupted());

        let err = AnalysisError::config("damping must be in (0, 1)");
        assert!(err.is_config_error());
    }

    #[test]
    fn test_interrupted() {
        assert!(AnalysisError::Cancelled("cycle search".into()).is_interrupted());
        assert!(AnalysisError::Timeout(std::time::Duration::from_secs(1)).is_interrupted());
        assert!(!AnalysisError::internal("boom").is_interrupted());
    }
}
