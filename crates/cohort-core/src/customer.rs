//! The customer entity

use serde::{Deserialize, Serialize};

use crate::attributes::{Attributes, EventCounts};

/// Primary key of a customer
pub type CustomerId = i64;

/// A customer as stored and served
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Unique customer id
    pub id: CustomerId,
    /// Consolidated attributes
    #[serde(default)]
    pub attributes: Attributes,
    /// Distinct event counts per event name
    #[serde(default)]
    pub events: EventCounts,
    /// Epoch seconds of the last attribute change, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
}

impl Customer {
    /// Create a customer with no events and no update time
    pub fn new(id: CustomerId, attributes: Attributes) -> Self {
        Self {
            id,
            attributes,
            events: EventCounts::new(),
            last_updated: None,
        }
    }

    /// Set the event counts
    pub fn with_events(mut self, events: EventCounts) -> Self {
        self.events = events;
        self
    }

    /// Set the last update time
    pub fn with_last_updated(mut self, last_updated: i64) -> Self {
        self.last_updated = Some(last_updated);
        self
    }

    /// Stamp the customer as updated now
    pub fn touch(&mut self) {
        self.last_updated = Some(chrono::Utc::now().timestamp());
    }
}
