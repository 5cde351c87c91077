//! Engine Configuration Management
//!
//! Provides unified configuration for every analysis:
//! - Logging
//! - Fraud rank and external risk rank propagation
//! - Cycle search and fan-out/fan-in detection
//! - Shell entity clustering and per-company shell scoring
//! - Collusion community detection
//! - Performance risk
//! - Suite execution (timeout)
//!
//! Every section uses `#[serde(default)]`, so a TOML file only needs the keys
//! it changes. Values without a meaningful default (negative damping, an empty
//! time window) are rejected by [`EngineConfig::validate`] before any analysis
//! starts.
//!
//! # Example
//!
//! ```rust,ignore
//! use graphrisk_core::config::EngineConfig;
//!
//! // Load from environment
//! let config = EngineConfig::from_env()?;
//!
//! // Or load from file
//! let config = EngineConfig::from_file("config/graphrisk.toml")?;
//! config.validate()?;
//! ```

mod detection;
mod propagation;

pub use detection::{
    CollusionConfig, CollusionWeights, CycleConfig, DateWindow, FanPatternConfig,
    FanPatternWeights, PerformRiskConfig, ShellClusterConfig, ShellCompanyConfig,
    ShellCompanyWeights, ShellWeights,
};
pub use propagation::{
    AbnormalWeights, ExternalRiskConfig, FraudRankConfig, PenaltyWeights, PropagationConfig,
    RiskBands, SeedFactorWeights, DEFAULT_EDGE_WEIGHT,
};

use crate::error::{AnalysisError, Result};
use crate::logging::{LogConfig, LogLevel};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Suite execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Overall deadline for a suite run in seconds (None = no deadline).
    pub timeout_secs: Option<u64>,
    /// Run analyses concurrently instead of one after another.
    pub parallel: bool,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            parallel: true,
        }
    }
}

/// Unified engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Environment name
    pub environment: String,
    /// Logging configuration
    pub logging: LogConfig,
    /// Legal-event fraud rank
    pub fraud_rank: FraudRankConfig,
    /// Penalty / abnormal-record risk rank
    pub external_risk: ExternalRiskConfig,
    /// Cycle search
    pub cycles: CycleConfig,
    /// Fan-out / fan-in detection
    pub fan_pattern: FanPatternConfig,
    /// Shell entity clustering
    pub shell: ShellClusterConfig,
    /// Per-company shell scoring
    pub shell_company: ShellCompanyConfig,
    /// Collusion communities
    pub collusion: CollusionConfig,
    /// Overdue performance risk
    pub perform_risk: PerformRiskConfig,
    /// Suite execution
    pub suite: SuiteConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            logging: LogConfig::default(),
            fraud_rank: FraudRankConfig::default(),
            external_risk: ExternalRiskConfig::default(),
            cycles: CycleConfig::default(),
            fan_pattern: FanPatternConfig::default(),
            shell: ShellClusterConfig::default(),
            shell_company: ShellCompanyConfig::default(),
            collusion: CollusionConfig::default(),
            perform_risk: PerformRiskConfig::default(),
            suite: SuiteConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create development configuration
    pub fn development() -> Self {
        Self {
            logging: LogConfig::development(),
            environment: "development".to_string(),
            ..Default::default()
        }
    }

    /// Create production configuration
    pub fn production() -> Self {
        Self {
            logging: LogConfig::production(),
            environment: "production".to_string(),
            suite: SuiteConfig {
                timeout_secs: Some(600),
                parallel: true,
            },
            ..Default::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// `GRAPHRISK_ENV` selects the preset; the remaining `GRAPHRISK_*`
    /// variables override single values. An unparsable value is an error.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("GRAPHRISK_ENV")
            .as_deref()
            .unwrap_or("development")
        {
            "production" | "prod" => Self::production(),
            _ => Self::development(),
        };

        if let Some(level) = env_override::<LogLevel>("GRAPHRISK_LOG_LEVEL")? {
            config.logging.level = level;
        }

        if let Some(damping) = env_override::<f64>("GRAPHRISK_DAMPING")? {
            config.fraud_rank.propagation.damping = damping;
            config.external_risk.propagation.damping = damping;
        }

        if let Some(max_iterations) = env_override::<u32>("GRAPHRISK_MAX_ITERATIONS")? {
            config.fraud_rank.propagation.max_iterations = max_iterations;
            config.external_risk.propagation.max_iterations = max_iterations;
        }

        if let Some(tolerance) = env_override::<f64>("GRAPHRISK_TOLERANCE")? {
            config.fraud_rank.propagation.tolerance = tolerance;
            config.external_risk.propagation.tolerance = tolerance;
        }

        if let Some(depth) = env_override::<usize>("GRAPHRISK_CYCLE_MAX_DEPTH")? {
            config.cycles.max_depth = depth;
        }

        if let Some(days) = env_override::<u32>("GRAPHRISK_TIME_WINDOW_DAYS")? {
            config.fan_pattern.time_window_days = Some(days);
        }

        if let Some(top_n) = env_override::<usize>("GRAPHRISK_PERFORM_TOP_N")? {
            config.perform_risk.top_n = top_n;
        }

        if let Some(secs) = env_override::<u64>("GRAPHRISK_TIMEOUT_SECS")? {
            config.suite.timeout_secs = Some(secs);
        }

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AnalysisError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| AnalysisError::config(format!("Failed to parse config: {}", e)))
    }

    /// Render configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AnalysisError::config(format!("Failed to serialize config: {}", e)))
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = self.to_toml_string()?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| AnalysisError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.fraud_rank.validate()?;
        self.external_risk.validate()?;
        self.cycles.validate()?;
        self.fan_pattern.validate()?;
        self.shell.validate()?;
        self.shell_company.validate()?;
        self.collusion.validate()?;
        self.perform_risk.validate()?;

        if self.suite.timeout_secs == Some(0) {
            return Err(AnalysisError::config("suite timeout_secs must be positive"));
        }

        if self.environment == "production" && self.suite.timeout_secs.is_none() {
            tracing::warn!("Production environment without a suite deadline");
        }

        Ok(())
    }

    /// Set environment
    pub fn with_environment(mut self, env: impl Into<String>) -> Self {
        self.environment = env.into();
        self
    }

    /// Set logging configuration
    pub fn with_logging(mut self, config: LogConfig) -> Self {
        self.logging = config;
        self
    }

    /// Set fraud rank configuration
    pub fn with_fraud_rank(mut self, config: FraudRankConfig) -> Self {
        self.fraud_rank = config;
        self
    }

    /// Set external risk configuration
    pub fn with_external_risk(mut self, config: ExternalRiskConfig) -> Self {
        self.external_risk = config;
        self
    }

    /// Set cycle search configuration
    pub fn with_cycles(mut self, config: CycleConfig) -> Self {
        self.cycles = config;
        self
    }

    /// Set fan pattern configuration
    pub fn with_fan_pattern(mut self, config: FanPatternConfig) -> Self {
        self.fan_pattern = config;
        self
    }

    /// Set shell cluster configuration
    pub fn with_shell(mut self, config: ShellClusterConfig) -> Self {
        self.shell = config;
        self
    }

    /// Set collusion configuration
    pub fn with_collusion(mut self, config: CollusionConfig) -> Self {
        self.collusion = config;
        self
    }

    /// Set per-company shell scoring configuration
    pub fn with_shell_company(mut self, config: ShellCompanyConfig) -> Self {
        self.shell_company = config;
        self
    }

    /// Set performance risk configuration
    pub fn with_perform_risk(mut self, config: PerformRiskConfig) -> Self {
        self.perform_risk = config;
        self
    }
}

fn env_override<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AnalysisError::config(format!("{}={:?}: {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}

/// Configuration builder
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Create new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from production preset
    pub fn production() -> Self {
        Self {
            config: EngineConfig::production(),
        }
    }

    /// Start from development preset
    pub fn development() -> Self {
        Self {
            config: EngineConfig::development(),
        }
    }

    /// Set environment
    pub fn environment(mut self, env: impl Into<String>) -> Self {
        self.config.environment = env.into();
        self
    }

    /// Configure fraud rank
    pub fn fraud_rank(mut self, f: impl FnOnce(FraudRankConfig) -> FraudRankConfig) -> Self {
        self.config.fraud_rank = f(self.config.fraud_rank);
        self
    }

    /// Configure external risk rank
    pub fn external_risk(
        mut self,
        f: impl FnOnce(ExternalRiskConfig) -> ExternalRiskConfig,
    ) -> Self {
        self.config.external_risk = f(self.config.external_risk);
        self
    }

    /// Configure cycle search
    pub fn cycles(mut self, f: impl FnOnce(CycleConfig) -> CycleConfig) -> Self {
        self.config.cycles = f(self.config.cycles);
        self
    }

    /// Configure fan pattern detection
    pub fn fan_pattern(mut self, f: impl FnOnce(FanPatternConfig) -> FanPatternConfig) -> Self {
        self.config.fan_pattern = f(self.config.fan_pattern);
        self
    }

    /// Configure shell clustering
    pub fn shell(mut self, f: impl FnOnce(ShellClusterConfig) -> ShellClusterConfig) -> Self {
        self.config.shell = f(self.config.shell);
        self
    }

    /// Configure collusion detection
    pub fn collusion(mut self, f: impl FnOnce(CollusionConfig) -> CollusionConfig) -> Self {
        self.config.collusion = f(self.config.collusion);
        self
    }

    /// Configure performance risk
    pub fn perform_risk(mut self, f: impl FnOnce(PerformRiskConfig) -> PerformRiskConfig) -> Self {
        self.config.perform_risk = f(self.config.perform_risk);
        self
    }

    /// Set the suite deadline
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.suite.timeout_secs = Some(secs);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build without validation
    pub fn build_unchecked(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.environment, "development");
        assert_eq!(config.fraud_rank.propagation.damping, 0.85);
        assert_eq!(config.cycles.max_depth, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_config() {
        let config = EngineConfig::production();
        assert_eq!(config.environment, "production");
        assert_eq!(config.logging.format, crate::logging::LogFormat::Json);
        assert_eq!(config.suite.timeout_secs, Some(600));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            environment = "staging"

            [fraud_rank.propagation]
            damping = 0.6

            [collusion]
            min_cluster_size = 4

            [perform_risk]
            top_n = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.environment, "staging");
        assert_eq!(config.fraud_rank.propagation.damping, 0.6);
        assert_eq!(config.fraud_rank.propagation.max_iterations, 100);
        assert_eq!(config.collusion.min_cluster_size, 4);
        assert_eq!(config.collusion.threshold_margin, 0.05);
        assert_eq!(config.shell.min_cluster_size, 2);
        assert_eq!(config.perform_risk.top_n, 3);
        assert_eq!(config.perform_risk.completed_status, "C");
        assert_eq!(config.shell_company.high_risk_threshold, 0.6);
    }

    #[test]
    fn test_toml_roundtrip_via_file() {
        let config = EngineConfigBuilder::production()
            .cycles(|c| CycleConfig {
                max_depth: 4,
                ..c
            })
            .build()
            .unwrap();

        let path = std::env::temp_dir().join(format!(
            "graphrisk-config-{}.toml",
            uuid::Uuid::new_v4()
        ));
        config.to_file(&path).unwrap();
        let loaded = EngineConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_builder_rejects_negative_damping() {
        let result = EngineConfigBuilder::new()
            .fraud_rank(|c| FraudRankConfig {
                propagation: c.propagation.with_damping(-0.1),
                ..c
            })
            .build();
        assert!(matches!(result, Err(AnalysisError::ConfigError(_))));
    }

    #[test]
    fn test_with_methods() {
        let config = EngineConfig::default()
            .with_environment("staging")
            .with_shell(ShellClusterConfig {
                exclude_internal: false,
                ..Default::default()
            });

        assert_eq!(config.environment, "staging");
        assert!(!config.shell.exclude_internal);
        assert!(EngineConfig::default().shell.exclude_internal);
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_file("/nonexistent/graphrisk.toml").unwrap_err();
        assert!(err.is_config_error());
    }
}
