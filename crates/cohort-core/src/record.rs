//! Records of the ingestion log

use serde::{Deserialize, Deserializer, Serialize};

use crate::attributes::Attributes;

/// Kind of a log record, taken from its `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// A single occurrence of a named event
    #[serde(rename = "event")]
    Event,
    /// A (partial) snapshot of a user's attributes
    #[serde(rename = "attributes")]
    Attributes,
    /// Any other `type` value; ignored during consolidation
    #[serde(other)]
    Unknown,
}

/// One line of the ingestion log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Unique record identifier (event ids are deduplicated on this)
    pub id: String,
    /// Record kind
    #[serde(rename = "type")]
    pub kind: RecordKind,
    /// Event name; empty for attribute records
    #[serde(default)]
    pub name: String,
    /// Owning user; empty for anonymous events
    #[serde(default)]
    pub user_id: String,
    /// Record payload
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Attributes,
    /// Epoch seconds at which the record was produced
    #[serde(default)]
    pub timestamp: i64,
    /// Byte offset just past this record's line in its source stream.
    ///
    /// Provenance only; never used for ordering.
    #[serde(skip)]
    pub position: u64,
}

impl RawRecord {
    /// Create an event record
    pub fn event(
        id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            kind: RecordKind::Event,
            name: name.into(),
            user_id: user_id.into(),
            data: Attributes::new(),
            timestamp,
            position: 0,
        }
    }

    /// Create an attribute record
    pub fn attributes(
        id: impl Into<String>,
        user_id: impl Into<String>,
        data: Attributes,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            kind: RecordKind::Attributes,
            name: String::new(),
            user_id: user_id.into(),
            data,
            timestamp,
            position: 0,
        }
    }

    /// Check whether the record names no user
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_empty()
    }

    /// Set the stream position
    pub fn with_position(mut self, position: u64) -> Self {
        self.position = position;
        self
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Attributes, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Attributes>::deserialize(deserializer)?.unwrap_or_default())
}
