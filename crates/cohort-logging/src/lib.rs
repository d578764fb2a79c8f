//! Structured logging for cohort
//!
//! Wraps `tracing-subscriber` so every binary configures output the same
//! way: JSONL on the console by default, human-readable output for
//! development, and an optional JSONL file sink with rotation.
//!
//! # Quick Start
//!
//! ```ignore
//! use cohort_logging::{CohortSubscriberBuilder, FileConfig, LogProfile, RotationStrategy};
//!
//! // JSONL to console
//! let _guard = CohortSubscriberBuilder::new().init()?;
//!
//! // Pretty console output plus a daily-rotated JSONL file
//! let _guard = CohortSubscriberBuilder::for_profile(LogProfile::Development)
//!     .with_file_output(FileConfig::new("logs", RotationStrategy::Daily))
//!     .init()?;
//! ```

pub mod config;

pub use config::{
    ConsoleFormat, DEFAULT_FILE_PREFIX, FileConfig, JsonlConfig, LogConfig, LogProfile,
    RotationStrategy,
};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The level directive could not be parsed
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    /// The log file could not be created
    #[error("log file error: {0}")]
    Io(#[from] std::io::Error),

    /// A global subscriber is already installed
    #[error("failed to install subscriber: {0}")]
    Init(#[from] TryInitError),

    /// A profile or rotation name was not recognized
    #[error("unknown {kind}: {value}")]
    UnknownValue {
        /// What was being parsed
        kind: &'static str,
        /// The rejected input
        value: String,
    },
}

/// Builder for configuring and initializing the cohort logging subscriber
///
/// By default, console output uses JSONL format at `info`.
#[derive(Debug, Default)]
pub struct CohortSubscriberBuilder {
    config: LogConfig,
}

impl CohortSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a profile
    pub fn for_profile(profile: LogProfile) -> Self {
        Self::new().with_config(LogConfig::for_profile(profile))
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Set the console format
    pub fn with_console(mut self, console: ConsoleFormat) -> Self {
        self.config.console = console;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// The configuration that `init` will apply
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// Returns a guard for the file writer, if any; it must be kept alive
    /// for the lifetime of the program or buffered lines are lost.
    ///
    /// # Errors
    ///
    /// Fails if the level is not a valid filter, the log file cannot be
    /// created, or a global subscriber is already installed.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&self.config.default_level)?,
        };

        let jsonl = &self.config.jsonl;

        let pretty_console = match self.config.console {
            ConsoleFormat::Pretty { ansi } => Some(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(ansi)
                    .with_target(true),
            ),
            _ => None,
        };

        let json_console = (self.config.console == ConsoleFormat::Json).then(|| {
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(jsonl.include_spans)
                .flatten_event(jsonl.flatten_events)
                .with_file(jsonl.include_location)
                .with_line_number(jsonl.include_location)
                .with_writer(std::io::stderr)
        });

        let (file_layer, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = file_writer(file_config)?;
                let layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(jsonl.include_spans)
                    .flatten_event(jsonl.flatten_events)
                    .with_file(jsonl.include_location)
                    .with_line_number(jsonl.include_location)
                    .with_writer(writer);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(pretty_console)
            .with(json_console)
            .with(file_layer)
            .try_init()?;

        Ok(guard)
    }
}

/// Create the file writer; a single file is truncated, rotated files append
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory)?;

    let pair = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            tracing_appender::non_blocking(File::create(path)?)
        }
        RotationStrategy::Daily => tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::DAILY,
            &config.directory,
            &config.prefix,
        )),
        RotationStrategy::Hourly => tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::HOURLY,
            &config.directory,
            &config.prefix,
        )),
    };
    Ok(pair)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides() {
        let builder = CohortSubscriberBuilder::for_profile(LogProfile::Quiet)
            .with_level("trace")
            .with_console(ConsoleFormat::Pretty { ansi: false })
            .with_file_output(FileConfig::new("logs", RotationStrategy::Hourly));

        let config = builder.config();
        assert_eq!(config.default_level, "trace");
        assert_eq!(config.console, ConsoleFormat::Pretty { ansi: false });
        assert_eq!(
            config.file.as_ref().map(|f| f.rotation),
            Some(RotationStrategy::Hourly)
        );
    }

    #[test]
    fn test_single_file_writer_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig::new(dir.path().join("nested"), RotationStrategy::Never);

        let (_writer, _guard) = file_writer(&config).unwrap();
        assert!(dir.path().join("nested").join("cohort.log").exists());
    }
}
