//! Core analysis traits.
//!
//! This module defines the traits every analysis implements:
//! - `Analysis`: base trait exposing metadata and configuration validation
//! - `BatchAnalysis`: one-shot execution over an input snapshot
//!
//! Cancellable analyses take their `CancellationToken` as part of the input;
//! the trait only bounds wall-clock time.

use crate::analysis::AnalysisMetadata;
use crate::error::{AnalysisError, Result};
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

// ============================================================================
// Core Analysis Traits
// ============================================================================

/// Base trait for all analyses.
pub trait Analysis: Send + Sync + Debug {
    /// Returns the analysis metadata.
    fn metadata(&self) -> &AnalysisMetadata;

    /// Validate the analysis configuration.
    ///
    /// Called before any computation so that undefined settings fail fast.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Returns the analysis ID.
    fn id(&self) -> &str {
        &self.metadata().id
    }
}

/// Trait for batch analyses.
///
/// # Type Parameters
///
/// - `I`: Input type
/// - `O`: Output type
#[async_trait]
pub trait BatchAnalysis<I, O>: Analysis
where
    I: Send + Sync,
    O: Send + Sync,
{
    /// Execute the analysis with the given input.
    async fn execute(&self, input: I) -> Result<O>;

    /// Validate the input before execution.
    fn validate_input(&self, _input: &I) -> Result<()> {
        Ok(())
    }

    /// Execute with a timeout.
    async fn execute_with_timeout(&self, input: I, timeout: Duration) -> Result<O>
    where
        I: 'async_trait,
    {
        match tokio::time::timeout(timeout, self.execute(input)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(AnalysisError::Timeout(timeout)),
        }
    }
}
