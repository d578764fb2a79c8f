//! Consolidated per-user summaries handed from ingestion to the store

use std::collections::{BTreeSet, HashMap};

use crate::attributes::{Attributes, EventCounts};

/// The winning attribute state of one user after consolidation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSnapshot {
    /// Merged attribute values
    pub attributes: Attributes,
    /// Timestamp of the winning record
    pub timestamp: i64,
    /// Id of the winning record
    pub record_id: String,
    /// Stream position of the winning record
    pub position: u64,
}

/// Output of consolidation: one attribute snapshot and one event count map per user.
///
/// A user may appear in only one of the two maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerSummaries {
    /// user_id -> winning attribute snapshot
    pub attributes: HashMap<String, AttributeSnapshot>,
    /// user_id -> event name -> distinct event count
    pub events: HashMap<String, EventCounts>,
}

impl CustomerSummaries {
    /// Every user id present in either map, sorted
    pub fn user_ids(&self) -> BTreeSet<&str> {
        self.attributes
            .keys()
            .chain(self.events.keys())
            .map(String::as_str)
            .collect()
    }

    /// Number of distinct users
    pub fn user_count(&self) -> usize {
        self.user_ids().len()
    }

    /// Check if no user was summarized
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.events.is_empty()
    }
}
