//! # GraphRisk Core
//!
//! Core abstractions, configuration and registry for the graph risk analytics engine.
//!
//! This crate provides:
//! - Domain and analysis metadata definitions
//! - Trait definitions for batch analyses
//! - Analysis registry
//! - Engine configuration (TOML files, environment overrides, presets)
//! - Logging setup on top of `tracing`
//! - Iterative convergence tracking
//! - Cancellation tokens and deadlines
//! - Small statistics helpers shared by the detectors

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod cancel;
pub mod config;
pub mod domain;
pub mod error;
pub mod iterative;
pub mod logging;
pub mod registry;
pub mod stats;
pub mod traits;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::analysis::AnalysisMetadata;
    pub use crate::cancel::{CancellationToken, DeadlineContext};
    pub use crate::config::{
        CollusionConfig, CycleConfig, DateWindow, EngineConfig, EngineConfigBuilder,
        ExternalRiskConfig, FanPatternConfig, FraudRankConfig, PerformRiskConfig,
        PropagationConfig, RiskBands, ShellClusterConfig, ShellCompanyConfig,
    };
    pub use crate::domain::{Domain, RiskLevel};
    pub use crate::error::{AnalysisError, Result};
    pub use crate::iterative::{ConvergenceSummary, IterativeState};
    pub use crate::logging::{LogConfig, LogFormat, LogLevel};
    pub use crate::registry::{AnalysisRegistry, RegistryStats};
    pub use crate::traits::{Analysis, BatchAnalysis};
}
