//! Single-pass consolidation of the record stream
//!
//! Events are counted at most once per event id. Attribute records are
//! merged into one winning snapshot per user: a record at least as new as
//! the current winner replaces it (keeping the winner's other keys), while
//! an older record can only fill keys the winner does not have.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use cohort_core::{
    AttributeSnapshot, CustomerSummaries, EventCounts, RawRecord, RecordKind, fill_gaps,
    merge_preferring,
};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::IngestError;
use crate::parser::{ParseStats, RecordStream};

/// Counters kept while consolidating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationStats {
    /// Records consumed
    pub records: u64,
    /// Events counted (first sighting of their id)
    pub events_counted: u64,
    /// Events dropped because their id was already seen
    pub duplicate_events: u64,
    /// Events without a user; their ids still take part in dedup
    pub anonymous_events: u64,
    /// Attribute records merged
    pub attribute_records: u64,
    /// Records of an unknown kind
    pub unknown_records: u64,
}

/// Accumulator for one ingestion pass
///
/// Owned by a single task; no internal locking.
#[derive(Debug, Default)]
pub struct RecordConsolidator {
    attributes: HashMap<String, AttributeSnapshot>,
    events: HashMap<String, EventCounts>,
    seen_event_ids: HashSet<String>,
    stats: ConsolidationStats,
}

impl RecordConsolidator {
    /// Create an empty consolidator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record into the accumulated state
    pub fn apply(&mut self, record: RawRecord) {
        self.stats.records += 1;
        match record.kind {
            RecordKind::Event => self.apply_event(record),
            RecordKind::Attributes => self.apply_attributes(record),
            RecordKind::Unknown => {
                self.stats.unknown_records += 1;
                trace!(id = %record.id, offset = record.position, "Ignoring record of unknown type");
            }
        }
    }

    fn apply_event(&mut self, record: RawRecord) {
        let RawRecord {
            id, name, user_id, ..
        } = record;

        if self.seen_event_ids.contains(&id) {
            self.stats.duplicate_events += 1;
            trace!(id = %id, "Dropping duplicate event");
            return;
        }
        if user_id.is_empty() {
            self.stats.anonymous_events += 1;
            trace!(id = %id, "Skipping anonymous event");
            self.seen_event_ids.insert(id);
            return;
        }
        self.seen_event_ids.insert(id);

        *self
            .events
            .entry(user_id)
            .or_default()
            .entry(name)
            .or_insert(0) += 1;
        self.stats.events_counted += 1;
    }

    fn apply_attributes(&mut self, record: RawRecord) {
        self.stats.attribute_records += 1;

        match self.attributes.entry(record.user_id) {
            Entry::Vacant(slot) => {
                slot.insert(AttributeSnapshot {
                    attributes: record.data,
                    timestamp: record.timestamp,
                    record_id: record.id,
                    position: record.position,
                });
            }
            Entry::Occupied(mut slot) => {
                let winner = slot.get_mut();
                if record.timestamp >= winner.timestamp {
                    *winner = AttributeSnapshot {
                        attributes: merge_preferring(&record.data, &winner.attributes),
                        timestamp: record.timestamp,
                        record_id: record.id,
                        position: record.position,
                    };
                } else {
                    fill_gaps(&mut winner.attributes, &record.data);
                }
            }
        }
    }

    /// Counters so far
    pub fn stats(&self) -> ConsolidationStats {
        self.stats
    }

    /// Hand over the summarized maps
    pub fn finish(self) -> (CustomerSummaries, ConsolidationStats) {
        let summaries = CustomerSummaries {
            attributes: self.attributes,
            events: self.events,
        };
        (summaries, self.stats)
    }
}

/// Result of a completed ingestion pass
#[derive(Debug, Clone)]
pub struct Consolidated {
    /// Per-user summaries ready for bulk load
    pub summaries: CustomerSummaries,
    /// Parser counters
    pub parse: ParseStats,
    /// Consolidation counters
    pub stats: ConsolidationStats,
}

/// Drain `stream` into a [`RecordConsolidator`]
///
/// # Errors
///
/// Returns the parser's error if it failed, and [`IngestError::Cancelled`]
/// if `cancel` fired at any point before the stream closed; a partially
/// consolidated result is never returned.
pub async fn consolidate(
    mut stream: RecordStream,
    cancel: &CancellationToken,
) -> Result<Consolidated, IngestError> {
    let mut consolidator = RecordConsolidator::new();
    while let Some(record) = stream.next().await {
        consolidator.apply(record);
    }

    let parse = stream.finish().await?;
    if cancel.is_cancelled() {
        return Err(IngestError::Cancelled);
    }

    let (summaries, stats) = consolidator.finish();
    Ok(Consolidated {
        summaries,
        parse,
        stats,
    })
}
