//! Configuration schema definitions.
//!
//! ```toml
//! [mediator]
//! source = "billing-service"
//! default_strategy = "concurrent-wait"
//!
//! [logging]
//! level = "debug"
//! format = "pretty"
//! output = "file"
//! file_path = "logs/herald.log"
//! rotation = "daily"
//!
//! [logging.span_events]
//! new = true
//! close = true
//!
//! [logging.filters]
//! herald_core = "trace"
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use herald_core::PublishStrategy;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeraldConfig {
    /// Dispatch settings.
    #[serde(default)]
    pub mediator: MediatorConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Dispatch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediatorConfig {
    /// `source` stamped on every envelope.
    #[serde(default = "default_source")]
    pub source: String,

    /// Strategy used by `Mediator::publish`.
    #[serde(default)]
    pub default_strategy: PublishStrategy,
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            default_strategy: PublishStrategy::default(),
        }
    }
}

fn default_source() -> String {
    "herald".to_string()
}

// =============================================================================
// Logging
// =============================================================================

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Output destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Log file path, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Rotation policy of the log file.
    #[serde(default)]
    pub rotation: LogRotation,

    /// Include thread IDs.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,

    /// Which span lifecycle events are logged.
    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-target level overrides, e.g. `herald_core = "trace"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lowercase name, as accepted in filter directives.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to the matching [`tracing::Level`].
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    Json,
}

/// Log output destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Log file rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Minutely,
    Hourly,
    Daily,
}

/// Span lifecycle events to log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HeraldConfig::default();
        assert_eq!(config.mediator.source, "herald");
        assert_eq!(
            config.mediator.default_strategy,
            PublishStrategy::SequentialContinue
        );
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.output, LogOutput::Stdout);
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: HeraldConfig = serde_json::from_value(serde_json::json!({
            "mediator": { "default_strategy": "concurrent-no-wait" },
            "logging": { "level": "trace", "filters": { "herald_core": "warn" } }
        }))
        .unwrap();

        assert_eq!(config.mediator.source, "herald");
        assert_eq!(
            config.mediator.default_strategy,
            PublishStrategy::ConcurrentNoWait
        );
        assert_eq!(config.logging.level, LogLevel::Trace);
        assert_eq!(config.logging.filters.get("herald_core"), Some(&LogLevel::Warn));
    }

    #[test]
    fn test_level_maps_to_tracing() {
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(LogLevel::Debug.to_string(), "debug");
    }
}
