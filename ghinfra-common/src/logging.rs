//! Logging setup shared by the CLI and tests.
//!
//! Events go to stderr through a non-blocking writer so stdout stays free for
//! command output. Keep the returned [`LoggingGuards`] alive until exit or
//! buffered events are lost.

use crate::config::EnvParser;
use std::io::IsTerminal;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Level or full `EnvFilter` directive.
    pub level: String,
    pub format: LogFormat,
    /// Rejected `GHINFRA_LOG_*` values, reported once logging is up.
    pub env_warnings: Vec<String>,
}

impl LogConfig {
    /// Read `GHINFRA_LOG_LEVEL` and `GHINFRA_LOG_FORMAT`, falling back to
    /// `default_level` and pretty output.
    pub fn from_env(default_level: &str) -> Self {
        let mut parser = EnvParser::new();
        let level = parser.get_log_level("LOG_LEVEL", default_level);
        let format = parser.get_choice("LOG_FORMAT", &["pretty", "json"], "pretty");
        Self {
            level: level.into_inner(),
            format: LogFormat::parse(&format.value),
            env_warnings: parser
                .take_errors()
                .into_iter()
                .map(|error| error.to_string())
                .collect(),
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            env_warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Flushes buffered log output on drop.
#[must_use = "dropping the guards stops log output"]
pub struct LoggingGuards {
    _stderr: WorkerGuard,
}

pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards, LoggingError> {
    let filter = EnvFilter::try_new(&config.level).map_err(|source| LoggingError::Filter {
        filter: config.level.clone(),
        source,
    })?;
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(false)
                    .with_ansi(std::io::stderr().is_terminal()),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init()?,
    }

    for warning in &config.env_warnings {
        tracing::warn!("{warning}");
    }

    Ok(LoggingGuards { _stderr: guard })
}
