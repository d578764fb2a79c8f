//! # Cohort Storage
//!
//! Customer stores implementing [`CustomerStore`].
//!
//! ## Features
//!
//! - **RedbCustomerStore**: redb-backed store on the in-memory backend. Every
//!   operation is one redb transaction; readers work on MVCC snapshots and
//!   are never blocked by writers, writers serialize on redb's write lock.
//! - **CustomerSnapshot**: a point-in-time read view for consistent
//!   multi-call pagination.
//! - **FixtureStore**: two fixed customers, for exercising the serving layer
//!   without an ingestion pass.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::num::NonZeroUsize;
//! use cohort_storage::{CustomerStore, RedbCustomerStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (store, report) = RedbCustomerStore::from_summaries(&summaries).unwrap();
//!     println!("loaded {} customers", report.loaded);
//!
//!     let first_page = store
//!         .list(NonZeroUsize::MIN, NonZeroUsize::new(25).unwrap())
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod fixture;
pub mod redb_store;
pub mod tables;

// Re-exports
pub use fixture::FixtureStore;
pub use redb_store::{CustomerSnapshot, LoadReport, RedbCustomerStore};
pub use tables::{CUSTOMERS, CustomerDb, CustomerDbConfig};

// Re-export the store contract from cohort-core for convenience
pub use cohort_core::{CustomerStore, StoreError};
