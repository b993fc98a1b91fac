//! Subscriber installation on top of `tracing-subscriber`.
//!
//! Every `Staff::call` runs inside a `capability` span named after the
//! capability, so turning on `span_events.new` and `span_events.close` logs
//! where each call starts and ends.
//!
//! ```rust,ignore
//! use ryanvk_runtime::config::{LogLevel, load_config};
//! use ryanvk_runtime::logging::{self, LoggingBuilder};
//! use tracing_subscriber::fmt::format::FmtSpan;
//!
//! logging::init_from_config(&load_config()?.logging)?;
//!
//! // or by hand
//! LoggingBuilder::new()
//!     .level(LogLevel::Debug)
//!     .directive("ryanvk_core=trace")
//!     .span_events(FmtSpan::NEW | FmtSpan::CLOSE)
//!     .try_init()?;
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to open log file: {0}")]
    File(#[from] InitError),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

impl SpanEventConfig {
    pub fn to_fmt_span(&self) -> FmtSpan {
        [
            (self.new, FmtSpan::NEW),
            (self.enter, FmtSpan::ENTER),
            (self.exit, FmtSpan::EXIT),
            (self.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .fold(FmtSpan::NONE, |events, (_, flag)| events | flag)
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        }
    }
}

/// Initialises logging from configuration.
///
/// An already installed subscriber is kept and is not an error.
pub fn init_from_config(config: &LoggingConfig) -> Result<(), LoggingError> {
    match LoggingBuilder::from_config(config).try_init() {
        Err(LoggingError::AlreadyInstalled(_)) => Ok(()),
        other => other,
    }
}

/// Builder for the global subscriber, seeded from a [`LoggingConfig`].
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    config: LoggingConfig,
    directives: Vec<String>,
    span_events: FmtSpan,
    with_target: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::from_config(&LoggingConfig::default())
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            directives: config
                .filters
                .iter()
                .map(|(target, level)| format!("{target}={level}"))
                .collect(),
            span_events: config.span_events.to_fmt_span(),
            config: config.clone(),
            with_target: true,
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// Adds an `EnvFilter` directive such as `ryanvk_core=trace`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn span_events(mut self, events: FmtSpan) -> Self {
        self.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.config.thread_ids = enabled;
        self
    }

    /// Log to `path`, rolling over as `rotation` says.
    pub fn file(mut self, path: impl Into<PathBuf>, rotation: LogRotation) -> Self {
        self.config.output = LogOutput::File;
        self.config.file_path = Some(path.into());
        self.config.rotation = rotation;
        self
    }

    /// `RUST_LOG` replaces the configured level; directives go on top.
    fn build_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.level.as_str()));

        for directive in &self.directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(err) => warn!(%directive, error = %err, "Ignoring invalid log directive"),
            }
        }
        filter
    }

    /// Installs the subscriber, reporting failures to stderr.
    pub fn init(self) {
        if let Err(err) = self.try_init() {
            eprintln!("ryanvk: logging not initialised: {err}");
        }
    }

    pub fn try_init(self) -> Result<(), LoggingError> {
        let layer = self.layer(self.writer()?);
        tracing_subscriber::registry()
            .with(layer)
            .with(self.build_filter())
            .try_init()?;
        Ok(())
    }

    fn writer(&self) -> Result<BoxMakeWriter, LoggingError> {
        let writer = match (self.config.output, &self.config.file_path) {
            (LogOutput::Stdout, _) => BoxMakeWriter::new(std::io::stdout),
            (LogOutput::Stderr, _) => BoxMakeWriter::new(std::io::stderr),
            (LogOutput::File, Some(path)) => {
                BoxMakeWriter::new(rolling_appender(path, self.config.rotation)?)
            }
            (LogOutput::File, None) => {
                warn!("File output requested but no file path configured, falling back to stdout");
                BoxMakeWriter::new(std::io::stdout)
            }
        };
        Ok(writer)
    }

    fn layer(&self, writer: BoxMakeWriter) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer()
            .with_span_events(self.span_events.clone())
            .with_target(self.with_target)
            .with_thread_ids(self.config.thread_ids)
            .with_file(self.config.file_location)
            .with_line_number(self.config.file_location)
            .with_writer(writer);

        match self.config.format {
            LogFormat::Compact => base.compact().boxed(),
            LogFormat::Full => base.boxed(),
            LogFormat::Pretty => base.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => base.json().boxed(),
        }
    }
}

/// `path` split into the appender's directory and file name prefix.
fn rolling_appender(path: &Path, rotation: LogRotation) -> Result<RollingFileAppender, InitError> {
    let directory = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = path.file_name().unwrap_or_else(|| OsStr::new("ryanvk.log"));

    RollingFileAppender::builder()
        .rotation(rotation.into())
        .filename_prefix(prefix.to_string_lossy())
        .build(directory)
}
