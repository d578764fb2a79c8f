//! Logging configuration
//!
//! A [`LogConfig`] is normally derived from a [`LogProfile`] and then
//! adjusted (level, console format, file sink) by command-line flags.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::LoggingError;

/// Prefix of log file names
pub const DEFAULT_FILE_PREFIX: &str = "cohort";

/// Starting points for a [`LogConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogProfile {
    /// JSONL console output at `info`
    #[default]
    Service,
    /// Colored human-readable console output at `debug`
    Development,
    /// JSONL console output at `warn`
    Quiet,
}

impl FromStr for LogProfile {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "service" => Ok(Self::Service),
            "development" | "dev" => Ok(Self::Development),
            "quiet" => Ok(Self::Quiet),
            other => Err(LoggingError::UnknownValue {
                kind: "log profile",
                value: other.to_string(),
            }),
        }
    }
}

/// How events are written to stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsoleFormat {
    /// One JSON object per line
    Json,
    /// Human-readable, optionally colored
    Pretty {
        /// Emit ANSI color codes
        ansi: bool,
    },
    /// No console output
    Off,
}

/// When the log file is rolled over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// One file, truncated at startup
    Never,
}

impl FromStr for RotationStrategy {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "hourly" => Ok(Self::Hourly),
            "never" => Ok(Self::Never),
            other => Err(LoggingError::UnknownValue {
                kind: "log rotation",
                value: other.to_string(),
            }),
        }
    }
}

/// JSONL file sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    pub directory: PathBuf,
    pub prefix: String,
    pub rotation: RotationStrategy,
}

impl FileConfig {
    /// A sink writing `cohort.*` files under `directory`
    pub fn new(directory: impl Into<PathBuf>, rotation: RotationStrategy) -> Self {
        Self {
            directory: directory.into(),
            prefix: DEFAULT_FILE_PREFIX.to_string(),
            rotation,
        }
    }
}

/// Shape of JSON lines, shared by console and file output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonlConfig {
    /// Put event fields at the top level instead of under `fields`
    pub flatten_events: bool,
    /// Include the span stack
    pub include_spans: bool,
    /// Include source file and line
    pub include_location: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            flatten_events: true,
            include_spans: true,
            include_location: false,
        }
    }
}

/// Complete subscriber configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub default_level: String,
    pub console: ConsoleFormat,
    pub file: Option<FileConfig>,
    pub jsonl: JsonlConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::for_profile(LogProfile::Service)
    }
}

impl LogConfig {
    pub fn for_profile(profile: LogProfile) -> Self {
        let (default_level, console, include_location) = match profile {
            LogProfile::Service => ("info", ConsoleFormat::Json, false),
            LogProfile::Development => ("debug", ConsoleFormat::Pretty { ansi: true }, true),
            LogProfile::Quiet => ("warn", ConsoleFormat::Json, false),
        };
        Self {
            default_level: default_level.to_string(),
            console,
            file: None,
            jsonl: JsonlConfig {
                include_location,
                ..JsonlConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles() {
        let service = LogConfig::default();
        assert_eq!(service.default_level, "info");
        assert_eq!(service.console, ConsoleFormat::Json);
        assert!(service.file.is_none());

        let dev = LogConfig::for_profile(LogProfile::Development);
        assert_eq!(dev.default_level, "debug");
        assert_eq!(dev.console, ConsoleFormat::Pretty { ansi: true });
        assert!(dev.jsonl.include_location);

        assert_eq!(LogConfig::for_profile(LogProfile::Quiet).default_level, "warn");
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("dev".parse::<LogProfile>().unwrap(), LogProfile::Development);
        assert_eq!("Hourly".parse::<RotationStrategy>().unwrap(), RotationStrategy::Hourly);
        assert!(matches!(
            "weekly".parse::<RotationStrategy>(),
            Err(LoggingError::UnknownValue { value, .. }) if value == "weekly"
        ));
    }

    #[test]
    fn test_file_config_prefix() {
        let file = FileConfig::new("/var/log/cohort", RotationStrategy::Never);
        assert_eq!(file.prefix, DEFAULT_FILE_PREFIX);
        assert_eq!(file.rotation, RotationStrategy::Never);
    }
}
