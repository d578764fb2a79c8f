//! Command-line interface and runtime configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use cohort_logging::{ConsoleFormat, FileConfig, LogConfig, LogProfile, RotationStrategy};
use cohort_stream::{DEFAULT_CHANNEL_CAPACITY, IngestConfig};

/// Default address the API listens on
pub const DEFAULT_LISTEN: &str = "0.0.0.0:1323";

/// Default log consumed at startup
pub const DEFAULT_DATA_FILE: &str = "data/messages.2.data";

/// Default grace period for in-flight requests on shutdown
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for the HTTP listener
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    pub listen: SocketAddr,
    /// Grace period for in-flight requests once shutdown starts
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 1323)),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Top-level `cohort` command line
#[derive(Parser)]
#[command(name = "cohort", about = "Customer log consolidation and CRUD API")]
pub struct Cli {
    /// Logging flags, accepted before or after the subcommand
    #[command(flatten)]
    pub logging: LoggingArgs,
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Logging flags shared by every subcommand
#[derive(Debug, Clone, Args)]
pub struct LoggingArgs {
    /// Logging profile (service, development, quiet)
    #[arg(long, global = true, default_value = "service")]
    pub log_profile: LogProfile,
    /// Log level, overriding the profile's (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    /// Human-readable console logs instead of JSONL
    #[arg(long, global = true)]
    pub pretty: bool,
    /// Also write JSONL logs to files in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
    /// Log file rotation (daily, hourly, never)
    #[arg(long, global = true, default_value = "daily")]
    pub log_rotation: RotationStrategy,
}

impl LoggingArgs {
    /// The subscriber configuration these flags describe
    pub fn log_config(&self) -> LogConfig {
        let mut config = LogConfig::for_profile(self.log_profile);
        if let Some(level) = &self.log_level {
            config.default_level = level.clone();
        }
        if self.pretty {
            config.console = ConsoleFormat::Pretty { ansi: true };
        }
        config.file = self
            .log_dir
            .as_ref()
            .map(|dir| FileConfig::new(dir.clone(), self.log_rotation));
        config
    }
}

/// `cohort` subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Ingest the log and serve the customer API
    Serve(ServeArgs),
    /// Ingest the log and compare the result against a verification file
    Verify(VerifyArgs),
}

/// Flags of `cohort serve`
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Newline-delimited JSON log to ingest
    #[arg(long, default_value = DEFAULT_DATA_FILE)]
    pub data_file: PathBuf,
    /// Address to listen on
    #[arg(long, default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,
    /// Records buffered between parser and consolidator
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,
    /// Seconds to wait for in-flight requests on shutdown
    #[arg(long, default_value_t = DEFAULT_SHUTDOWN_TIMEOUT.as_secs())]
    pub shutdown_timeout_secs: u64,
    /// Serve the two fixture customers instead of ingesting a log
    #[arg(long)]
    pub fixture: bool,
}

impl ServeArgs {
    /// Ingestion settings for the startup pass
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            channel_capacity: self.channel_capacity,
        }
    }

    /// Listener settings
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            listen: self.listen,
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
        }
    }
}

/// Flags of `cohort verify`
#[derive(Debug, Clone, Args)]
pub struct VerifyArgs {
    /// Newline-delimited JSON log to ingest
    #[arg(long, default_value = DEFAULT_DATA_FILE)]
    pub data_file: PathBuf,
    /// Expected customers, one `id,key=value,...` line each
    #[arg(long)]
    pub verify_file: PathBuf,
    /// Records buffered between parser and consolidator
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,
}

impl VerifyArgs {
    /// Ingestion settings for the verification pass
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            channel_capacity: self.channel_capacity,
        }
    }
}
