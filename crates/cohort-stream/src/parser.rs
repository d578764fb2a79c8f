//! Line-delimited JSON record parser
//!
//! Reads a seekable byte source line by line on a background task and hands
//! each parsed [`RawRecord`] to the consumer over a bounded channel. The
//! parser starts at the reader's current seek position, so a caller can
//! resume from any `position` previously stamped on a record.

use cohort_core::RawRecord;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncSeek, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::IngestError;

/// Counters kept by the parser task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Lines read, including blank and malformed ones
    pub lines: u64,
    /// Records handed to the consumer
    pub records: u64,
    /// Lines that failed to parse
    pub malformed: u64,
    /// Offset the parser started at
    pub start_offset: u64,
    /// Offset just past the last line read
    pub end_offset: u64,
}

/// Spawns parser tasks over seekable readers
#[derive(Debug, Clone)]
pub struct StreamParser {
    capacity: usize,
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new(crate::DEFAULT_CHANNEL_CAPACITY)
    }
}

impl StreamParser {
    /// Create a parser whose hand-off channel holds at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }

    /// Start parsing `reader` from its current position
    ///
    /// The returned stream is finite and cannot be restarted. Once `cancel`
    /// fires the parser stops enqueuing records and closes the channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the current position of `reader` cannot be read.
    pub async fn spawn<R>(
        &self,
        mut reader: R,
        cancel: CancellationToken,
    ) -> Result<RecordStream, IngestError>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    {
        let start = reader.stream_position().await?;
        let (tx, rx) = mpsc::channel(self.capacity);

        debug!(offset = start, capacity = self.capacity, "Starting stream parser");
        let task = tokio::spawn(produce(BufReader::new(reader), start, tx, cancel));

        Ok(RecordStream { rx, task })
    }
}

/// Consumer end of a running parser
pub struct RecordStream {
    rx: mpsc::Receiver<RawRecord>,
    task: JoinHandle<Result<ParseStats, IngestError>>,
}

impl RecordStream {
    /// Wait for the next record; `None` once the parser has closed the channel
    pub async fn next(&mut self) -> Option<RawRecord> {
        self.rx.recv().await
    }

    /// Stop consuming and collect the parser's outcome
    ///
    /// # Errors
    ///
    /// Returns the parser's I/O error, or [`IngestError::Task`] if the task
    /// did not run to completion.
    pub async fn finish(self) -> Result<ParseStats, IngestError> {
        let Self { rx, task } = self;
        // Unblocks a producer parked on a full channel.
        drop(rx);
        task.await
            .map_err(|e| IngestError::Task(e.to_string()))?
    }
}

async fn produce<R>(
    mut reader: BufReader<R>,
    start: u64,
    tx: mpsc::Sender<RawRecord>,
    cancel: CancellationToken,
) -> Result<ParseStats, IngestError>
where
    R: AsyncRead + Unpin,
{
    let mut stats = ParseStats {
        start_offset: start,
        end_offset: start,
        ..Default::default()
    };
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(offset = stats.end_offset, "Parser cancelled while reading");
                break;
            }
            read = reader.read_until(b'\n', &mut line) => read?,
        };
        if read == 0 {
            break;
        }

        stats.lines += 1;
        stats.end_offset += read as u64;

        let trimmed = trim_line_ending(&line);
        if trimmed.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let record = match serde_json::from_slice::<RawRecord>(trimmed) {
            Ok(record) => record.with_position(stats.end_offset),
            Err(e) => {
                stats.malformed += 1;
                warn!(offset = stats.end_offset, error = %e, "Skipping malformed log line");
                continue;
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(offset = stats.end_offset, "Parser cancelled while handing off");
                break;
            }
            sent = tx.send(record) => {
                if sent.is_err() {
                    trace!("Record consumer went away");
                    break;
                }
                stats.records += 1;
            }
        }
    }

    debug!(
        lines = stats.lines,
        records = stats.records,
        malformed = stats.malformed,
        offset = stats.end_offset,
        "Stream parser finished"
    );
    Ok(stats)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
