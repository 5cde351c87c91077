//! Logging setup.
//!
//! Analyses log through `tracing`; this module only decides how those events
//! are rendered. Output goes to stderr so that reports written to stdout stay
//! machine-readable.
//!
//! # Example
//!
//! ```rust,ignore
//! use graphrisk_core::logging::{LogConfig, LogLevel};
//!
//! LogConfig::production()
//!     .with_target_level("graphrisk_graph", LogLevel::Debug)
//!     .init()?;
//! ```

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Verbosity of a log target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-edge and per-iteration detail.
    Trace,
    /// Per-item detail: loaded edge counts, skipped records, cluster sizes.
    Debug,
    /// Analysis boundaries.
    #[default]
    Info,
    /// Non-convergence, clamped weights, truncated searches.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Filter directive name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            other => {
                return Err(AnalysisError::config(format!("unknown log level '{}'", other)));
            }
        };
        Ok(level)
    }
}

/// Rendering of log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging configuration, the `[logging]` section of the engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level for every target without an override.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
    /// Include file and line of the call site.
    pub source_location: bool,
    /// Include the emitting thread, useful when the suite runs in parallel.
    pub thread_ids: bool,
    /// Per-target overrides, e.g. `graphrisk_compliance = "debug"`.
    pub targets: BTreeMap<String, LogLevel>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            source_location: false,
            thread_ids: false,
            targets: BTreeMap::new(),
        }
    }
}

impl LogConfig {
    /// Verbose human-readable output.
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            source_location: true,
            ..Default::default()
        }
    }

    /// JSON output at info with thread ids.
    pub fn production() -> Self {
        Self {
            format: LogFormat::Json,
            thread_ids: true,
            ..Default::default()
        }
    }

    /// Set the default level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Override the level of one target.
    pub fn with_target_level(mut self, target: impl Into<String>, level: LogLevel) -> Self {
        self.targets.insert(target.into(), level);
        self
    }

    /// Filter directives equivalent to this configuration, e.g. `info,graphrisk_graph=debug`.
    pub fn directives(&self) -> String {
        self.targets
            .iter()
            .fold(self.level.to_string(), |mut out, (target, level)| {
                out.push(',');
                out.push_str(target);
                out.push('=');
                out.push_str(level.as_str());
                out
            })
    }

    /// Install the global subscriber.
    ///
    /// `RUST_LOG` takes precedence over the configured levels. A second call
    /// leaves the first subscriber in place.
    pub fn init(&self) -> Result<()> {
        use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(self.directives()))
            .map_err(|e| AnalysisError::config(format!("invalid log filter: {}", e)))?;

        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_thread_ids(self.thread_ids)
            .with_file(self.source_location)
            .with_line_number(self.source_location);

        let registry = tracing_subscriber::registry().with(filter);
        let installed = match self.format {
            LogFormat::Json => registry.with(layer.json()).try_init(),
            LogFormat::Pretty => registry.with(layer).try_init(),
        };
        if installed.is_err() {
            tracing::debug!("log subscriber already installed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!(" INFO ".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().unwrap_err().is_config_error());
    }

    #[test]
    fn test_presets() {
        let production = LogConfig::production();
        assert_eq!(production.format, LogFormat::Json);
        assert_eq!(production.level, LogLevel::Info);

        let development = LogConfig::development();
        assert_eq!(development.format, LogFormat::Pretty);
        assert_eq!(development.level, LogLevel::Debug);
    }

    #[test]
    fn test_directives() {
        let config = LogConfig::default()
            .with_level(LogLevel::Warn)
            .with_target_level("graphrisk_graph", LogLevel::Debug)
            .with_target_level("graphrisk_compliance", LogLevel::Trace);
        assert_eq!(
            config.directives(),
            "warn,graphrisk_compliance=trace,graphrisk_graph=debug"
        );
    }

    #[test]
    fn test_section_from_toml() {
        let config: LogConfig = toml::from_str(
            r#"
            format = "json"
            [targets]
            graphrisk_graph = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.targets["graphrisk_graph"], LogLevel::Debug);
    }

    #[test]
    fn test_init_twice() {
        let config = LogConfig::default();
        assert!(config.init().is_ok());
        assert!(config.init().is_ok());
    }
}
