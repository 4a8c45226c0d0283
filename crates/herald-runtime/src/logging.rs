//! Logging setup over `tracing-subscriber`.
//!
//! The mediator emits a `debug` span per `send` / `publish` call carrying the
//! payload type and envelope id. Enabling span events makes those calls
//! visible as they open and close:
//!
//! ```rust,ignore
//! use herald_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! LoggingBuilder::new()
//!     .directive("herald_core=debug")
//!     .span_events(SpanEvents::Lifecycle)
//!     .init();
//! ```
//!
//! Or from configuration:
//!
//! ```rust,ignore
//! let config = herald_runtime::config::load_config()?;
//! herald_runtime::logging::init_from_config(&config.logging);
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

/// Span lifecycle events written alongside regular events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpanEvents {
    #[default]
    None,
    /// Creation and close: each dispatch call shows up once at each end.
    Lifecycle,
    Full,
    /// An explicit selection, as read from configuration.
    Custom(SpanEventConfig),
}

impl SpanEvents {
    fn to_fmt_span(self) -> FmtSpan {
        match self {
            Self::None => FmtSpan::NONE,
            Self::Lifecycle => FmtSpan::NEW | FmtSpan::CLOSE,
            Self::Full => FmtSpan::FULL,
            Self::Custom(config) => [
                (config.new, FmtSpan::NEW),
                (config.enter, FmtSpan::ENTER),
                (config.exit, FmtSpan::EXIT),
                (config.close, FmtSpan::CLOSE),
            ]
            .into_iter()
            .filter(|(enabled, _)| *enabled)
            .fold(FmtSpan::NONE, |acc, (_, span)| acc | span),
        }
    }
}

impl From<SpanEventConfig> for SpanEvents {
    fn from(config: SpanEventConfig) -> Self {
        match (config.new, config.enter, config.exit, config.close) {
            (false, false, false, false) => Self::None,
            (true, false, false, true) => Self::Lifecycle,
            (true, true, true, true) => Self::Full,
            _ => Self::Custom(config),
        }
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Minutely => Rotation::MINUTELY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        }
    }
}

/// Initializes logging from a [`LoggingConfig`].
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// Builds and installs the global `tracing` subscriber.
#[derive(Debug)]
pub struct LoggingBuilder {
    level: tracing::Level,
    directives: Vec<String>,
    format: LogFormat,
    output: LogOutput,
    file_path: Option<PathBuf>,
    rotation: LogRotation,
    span_events: SpanEvents,
    target: bool,
    thread_ids: bool,
    file_location: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            directives: Vec::new(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            rotation: LogRotation::default(),
            span_events: SpanEvents::default(),
            target: true,
            thread_ids: false,
            file_location: false,
        }
    }
}

impl LoggingBuilder {
    /// Creates a builder logging `info` and above to stdout in the compact format.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder from the `logging` configuration section.
    ///
    /// Per-target filters become directives.
    pub fn from_config(config: &LoggingConfig) -> Self {
        // Sorted so the resulting filter does not depend on map order.
        let mut filters: Vec<_> = config.filters.iter().collect();
        filters.sort_by(|a, b| a.0.cmp(b.0));

        Self {
            level: config.level.to_tracing_level(),
            directives: filters
                .into_iter()
                .map(|(target, level)| format!("{target}={level}"))
                .collect(),
            format: config.format,
            output: config.output,
            file_path: config.file_path.clone(),
            rotation: config.rotation,
            span_events: config.span_events.into(),
            thread_ids: config.thread_ids,
            file_location: config.file_location,
            ..Self::default()
        }
    }

    /// Sets the base level, used when `RUST_LOG` is unset.
    pub fn level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `herald_core=trace`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Sets the event format.
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets where events are written.
    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Sets the log file; only used with [`LogOutput::File`].
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Sets how often the log file rolls over.
    pub fn rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Sets which span lifecycle events are logged.
    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    /// Includes the event target (the module path). On by default.
    pub fn show_target(mut self, enabled: bool) -> Self {
        self.target = enabled;
        self
    }

    /// Includes the id of the emitting thread.
    pub fn show_thread_ids(mut self, enabled: bool) -> Self {
        self.thread_ids = enabled;
        self
    }

    /// Includes source file and line in each event.
    pub fn show_file_location(mut self, enabled: bool) -> Self {
        self.file_location = enabled;
        self
    }

    /// `RUST_LOG` takes precedence over the configured level; directives are
    /// added on top of either.
    fn build_filter(&self) -> EnvFilter {
        let base = self.level.to_string().to_lowercase();
        let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base));

        for directive in &self.directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(err) => eprintln!("Ignoring invalid log directive {directive:?}: {err}"),
            }
        }

        filter
    }

    fn file_appender(&self) -> Result<RollingFileAppender, String> {
        let path = self
            .file_path
            .as_deref()
            .ok_or("file log output requested without a file path")?;
        RollingFileAppender::builder()
            .rotation(self.rotation.into())
            .filename_prefix(
                path.file_name()
                    .and_then(OsStr::to_str)
                    .unwrap_or("herald.log"),
            )
            .build(path.parent().unwrap_or_else(|| Path::new(".")))
            .map_err(|err| format!("cannot open log file {}: {err}", path.display()))
    }

    fn make_writer(&self) -> BoxMakeWriter {
        match self.output {
            LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
            LogOutput::File => match self.file_appender() {
                Ok(appender) => BoxMakeWriter::new(appender),
                Err(reason) => {
                    eprintln!("{reason}, logging to stdout");
                    BoxMakeWriter::new(std::io::stdout)
                }
            },
        }
    }

    /// Installs the subscriber, ignoring failure.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber; fails if one is already installed.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let layer = fmt::layer()
            .with_writer(self.make_writer())
            .with_span_events(self.span_events.to_fmt_span())
            .with_target(self.target)
            .with_thread_ids(self.thread_ids)
            .with_file(self.file_location)
            .with_line_number(self.file_location);

        let layer = match self.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
            // Json without the `json-log` feature falls back to the full format.
            _ => layer.boxed(),
        };

        tracing_subscriber::registry()
            .with(layer)
            .with(self.build_filter())
            .try_init()
    }
}
