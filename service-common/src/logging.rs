//! Structured logging setup.
//!
//! Maps the organization's level names (`OFF`, `SERVICE`, `CRITICAL`, `ERROR`,
//! `INFO`, `DEBUG`) onto `tracing` filters and installs a global
//! `tracing-subscriber` writing to stdout, stderr, a file, or nowhere. The
//! level filter sits behind a reload layer so [`LoggingHandle::set_level`]
//! can change verbosity while the service runs.

use std::fmt;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing::{Dispatch, Level};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{
    EnvFilter, Registry, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

use crate::{Result, ServiceError};

/// Verbosity levels understood by services.
///
/// Serialized as the upper-case level name. Deserialization accepts the same
/// names as [`FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogLevel {
    /// No output at all.
    Off,
    /// Service lifecycle messages only.
    Service,
    /// Critical failures.
    Critical,
    /// Errors.
    Error,
    /// Warnings.
    Warn,
    /// Informational messages.
    Info,
    /// Everything.
    Debug,
}

impl LogLevel {
    /// Level used when a configured name is not recognized.
    pub const FALLBACK: Self = Self::Error;

    /// Parse a level name, falling back to [`Self::FALLBACK`].
    #[must_use]
    pub fn parse_or_fallback(name: &str) -> Self {
        name.parse().unwrap_or(Self::FALLBACK)
    }

    /// The `tracing` filter this level enables.
    #[must_use]
    pub const fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Service | Self::Critical | Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Service => "SERVICE",
            Self::Critical => "CRITICAL",
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OFF" => Ok(Self::Off),
            "SERVICE" => Ok(Self::Service),
            "CRITICAL" => Ok(Self::Critical),
            "ERROR" => Ok(Self::Error),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "INFO" => Ok(Self::Info),
            "DEBUG" => Ok(Self::Debug),
            _ => Err(ServiceError::invalid_config(format!("unknown log level {s:?}"))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for LogLevel {
    type Error = ServiceError;

    fn try_from(name: String) -> Result<Self> {
        name.parse()
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

/// Where log output goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogOutput {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
    /// Dropped.
    Discard,
    /// Appended to a file, created if missing.
    File(PathBuf),
}

impl LogOutput {
    /// Interpret a configured output name.
    ///
    /// `""` and `"stdout"` mean stdout, `"stderr"` means stderr and
    /// `"/dev/null"` discards. Anything else is a file path.
    #[must_use]
    pub fn parse(setting: &str) -> Self {
        match setting {
            "" | "stdout" => Self::Stdout,
            "stderr" => Self::Stderr,
            "/dev/null" => Self::Discard,
            path => Self::File(PathBuf::from(path)),
        }
    }

    /// Build a writer factory for the subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Io`] if the log file cannot be opened.
    pub fn make_writer(&self) -> Result<BoxMakeWriter> {
        Ok(match self {
            Self::Stdout => BoxMakeWriter::new(std::io::stdout),
            Self::Stderr => BoxMakeWriter::new(std::io::stderr),
            Self::Discard => BoxMakeWriter::new(std::io::sink),
            Self::File(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                BoxMakeWriter::new(Mutex::new(file))
            }
        })
    }

    const fn is_terminal_stream(&self) -> bool {
        matches!(self, Self::Stdout | Self::Stderr)
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Service name attached to the root span
    pub service_name: String,
    /// Verbosity
    pub level: LogLevel,
    /// Destination
    pub output: LogOutput,
    /// Whether to output JSON format
    pub json_output: bool,
    unrecognized_level: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            service_name: "service".to_string(),
            level: LogLevel::Info,
            output: LogOutput::Stdout,
            json_output: false,
            unrecognized_level: None,
        }
    }
}

impl LoggingConfig {
    /// Create config with custom service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Create config with custom log level.
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self.unrecognized_level = None;
        self
    }

    /// Set the level from a configured name. Unknown names fall back to
    /// `ERROR` and are reported once logging is initialized.
    #[must_use]
    pub fn with_level_name(mut self, name: &str) -> Self {
        let (level, recognized) = resolve_level(name);
        self.level = level;
        self.unrecognized_level = (!recognized).then(|| name.to_string());
        self
    }

    /// Create config with a custom destination.
    #[must_use]
    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Enable JSON output.
    #[must_use]
    pub const fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    /// The level name that was rejected by [`Self::with_level_name`], if any.
    #[must_use]
    pub fn unrecognized_level(&self) -> Option<&str> {
        self.unrecognized_level.as_deref()
    }

    /// Root span carrying the `service` field.
    ///
    /// Entered at `ERROR` so it is enabled under every filter except `OFF`.
    #[must_use]
    pub fn service_span(&self) -> tracing::Span {
        tracing::span!(Level::ERROR, "service", service = %self.service_name)
    }
}

/// Runtime control over the installed subscriber's level.
#[derive(Debug, Clone)]
pub struct LoggingHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    level: Arc<parking_lot::Mutex<LogLevel>>,
}

impl LoggingHandle {
    /// Switch to the level called `name`.
    ///
    /// Unknown names fall back to `ERROR` and are reported at that severity,
    /// the same way [`LoggingConfig::with_level_name`] treats them. The new
    /// level replaces any `RUST_LOG` directives.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Logging`] if the subscriber has been dropped.
    pub fn set_level(&self, name: &str) -> Result<LogLevel> {
        let (level, recognized) = resolve_level(name);
        self.set_log_level(level)?;
        if !recognized {
            report_unrecognized(name);
        }
        Ok(level)
    }

    /// Switch to `level`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Logging`] if the subscriber has been dropped.
    pub fn set_log_level(&self, level: LogLevel) -> Result<()> {
        self.filter
            .reload(level_filter(level))
            .map_err(|e| ServiceError::Logging(e.to_string()))?;
        *self.level.lock() = level;
        tracing::debug!(%level, "Log level changed");
        Ok(())
    }

    /// The level last applied through this handle, or the configured one.
    #[must_use]
    pub fn level(&self) -> LogLevel {
        *self.level.lock()
    }
}

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG`, when set, overrides the configured level until the returned
/// handle changes it.
///
/// # Errors
///
/// Returns [`ServiceError::Io`] if the log file cannot be opened and
/// [`ServiceError::Logging`] if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingHandle> {
    let (dispatch, handle) = build_dispatch(config)?;
    dispatch
        .try_init()
        .map_err(|e| ServiceError::Logging(e.to_string()))?;

    if let Some(name) = config.unrecognized_level() {
        report_unrecognized(name);
    }
    tracing::debug!(
        service = %config.service_name,
        level = %config.level,
        output = ?config.output,
        "Logging initialized"
    );
    Ok(handle)
}

fn build_dispatch(config: &LoggingConfig) -> Result<(Dispatch, LoggingHandle)> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(config.level));
    let (filter, reload_handle) = reload::Layer::new(filter);
    let writer = config.output.make_writer()?;
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(config.output.is_terminal_stream());

    let registry = tracing_subscriber::registry().with(filter);
    let dispatch = if config.json_output {
        Dispatch::new(registry.with(layer.json()))
    } else {
        Dispatch::new(registry.with(layer))
    };

    let handle = LoggingHandle {
        filter: reload_handle,
        level: Arc::new(parking_lot::Mutex::new(config.level)),
    };
    Ok((dispatch, handle))
}

fn level_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::default().add_directive(level.to_level_filter().into())
}

fn resolve_level(name: &str) -> (LogLevel, bool) {
    name.parse()
        .map_or((LogLevel::FALLBACK, false), |level| (level, true))
}

fn report_unrecognized(name: &str) {
    // ERROR so the notice survives the fallback filter.
    tracing::error!(
        level = %name,
        fallback = %LogLevel::FALLBACK,
        "Unrecognized log level"
    );
}
