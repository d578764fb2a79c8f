//! Error types for cohort-stream

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort ingestion
///
/// Malformed lines are not errors; they are skipped and counted.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The log file could not be opened
    #[error("failed to open log file {}: {source}", path.display())]
    Open {
        /// Path that was requested
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Reading or seeking the log failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cancellation was observed before consolidation completed
    #[error("ingestion cancelled before consolidation completed")]
    Cancelled,

    /// The parser task panicked or was aborted
    #[error("parser task failed: {0}")]
    Task(String),
}

impl IngestError {
    /// Check whether ingestion stopped because of cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
