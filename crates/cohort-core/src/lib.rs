//! # Cohort Core
//!
//! Core traits, types, and errors shared by the ingestion pipeline, the
//! customer stores and the serving adapter.
//!
//! ## Key Types
//!
//! - [`RawRecord`]: One line of the ingestion log (an event or an attribute snapshot)
//! - [`CustomerSummaries`]: Per-user output of consolidation, input of bulk load
//! - [`Customer`]: The persistent entity served outward
//!
//! ## Key Traits
//!
//! - [`CustomerStore`]: The six store operations consumed by the serving layer

pub mod attributes;
pub mod customer;
pub mod error;
pub mod record;
pub mod summary;
pub mod traits;

// Re-export main types
pub use attributes::*;
pub use customer::*;
pub use error::*;
pub use record::*;
pub use summary::*;
pub use traits::*;
