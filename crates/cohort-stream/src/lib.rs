//! # Cohort Stream
//!
//! Startup ingestion for cohort: a [`StreamParser`] turns a newline-delimited
//! JSON log into a bounded stream of [`RawRecord`](cohort_core::RawRecord)s
//! and a [`RecordConsolidator`] folds that stream into one
//! [`CustomerSummaries`](cohort_core::CustomerSummaries) value.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cohort_stream::{IngestConfig, ingest_file};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cancel = CancellationToken::new();
//!     let consolidated = ingest_file("data/messages.2.data", &IngestConfig::default(), cancel)
//!         .await
//!         .unwrap();
//!     println!("{} users", consolidated.summaries.user_count());
//! }
//! ```

pub mod consolidator;
pub mod error;
pub mod parser;

pub use consolidator::{Consolidated, ConsolidationStats, RecordConsolidator, consolidate};
pub use error::IngestError;
pub use parser::{ParseStats, RecordStream, StreamParser};

use std::path::Path;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Default number of records buffered between parser and consolidator
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Ingestion settings
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Records buffered between parser and consolidator
    pub channel_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Parse and consolidate the log at `path`
///
/// # Errors
///
/// Fails if the file cannot be opened, if reading it fails, or if `cancel`
/// fires before consolidation completes.
#[instrument(skip(config, cancel), fields(path = %path.as_ref().display()))]
pub async fn ingest_file(
    path: impl AsRef<Path>,
    config: &IngestConfig,
    cancel: CancellationToken,
) -> Result<Consolidated, IngestError> {
    let path = path.as_ref();
    let start = Instant::now();

    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| IngestError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let stream = StreamParser::new(config.channel_capacity)
        .spawn(file, cancel.clone())
        .await?;
    let consolidated = consolidate(stream, &cancel).await?;

    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        records = consolidated.stats.records,
        malformed = consolidated.parse.malformed,
        events_counted = consolidated.stats.events_counted,
        duplicate_events = consolidated.stats.duplicate_events,
        anonymous_events = consolidated.stats.anonymous_events,
        attribute_records = consolidated.stats.attribute_records,
        unknown_records = consolidated.stats.unknown_records,
        users = consolidated.summaries.user_count(),
        "Consolidated record stream"
    );

    Ok(consolidated)
}
