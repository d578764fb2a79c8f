//! redb table definitions and database handle
//!
//! Customers live in a single table keyed by customer id. redb orders
//! integer keys numerically, so a table scan is the ascending-id listing.

use std::fmt::Display;

use cohort_core::{Attributes, Customer, CustomerId, EventCounts, StoreError};
use redb::backends::InMemoryBackend;
use redb::{Database, ReadTransaction, Table, TableDefinition};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

// Key: customer id, Value: postcard-encoded CustomerRow
pub const CUSTOMERS: TableDefinition<CustomerId, &[u8]> = TableDefinition::new("customers");

/// Configuration for the customer database
#[derive(Debug, Clone)]
pub struct CustomerDbConfig {
    /// Cache size in bytes
    pub cache_size: usize,
}

impl Default for CustomerDbConfig {
    fn default() -> Self {
        Self {
            cache_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

/// Stored form of a customer; the id is the table key
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CustomerRow {
    attributes: Attributes,
    events: EventCounts,
    last_updated: Option<i64>,
}

/// Handle to the redb database holding the customer table
pub struct CustomerDb {
    db: Database,
}

impl CustomerDb {
    /// Create an empty in-memory database
    #[instrument(skip(config))]
    pub fn in_memory(config: CustomerDbConfig) -> Result<Self, StoreError> {
        let db = Database::builder()
            .set_cache_size(config.cache_size)
            .create_with_backend(InMemoryBackend::new())
            .map_err(db_err)?;

        info!("Opened in-memory customer database");

        let storage = Self { db };
        storage.init_tables()?;
        Ok(storage)
    }

    /// Create the customer table so read transactions can always open it
    fn init_tables(&self) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        write_txn.open_table(CUSTOMERS).map_err(db_err)?;
        write_txn.commit().map_err(db_err)?;

        debug!("Initialized redb tables");
        Ok(())
    }

    /// Begin a read transaction (a point-in-time snapshot)
    pub fn begin_read(&self) -> Result<ReadTransaction, StoreError> {
        self.db.begin_read().map_err(db_err)
    }

    /// Run `op` against the customer table in one write transaction
    ///
    /// The transaction commits if `op` succeeds and is aborted otherwise, so
    /// a failed mutation leaves no trace.
    pub fn write_with<T>(
        &self,
        op: impl FnOnce(&mut Table<'_, CustomerId, &'static [u8]>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let write_txn = self.db.begin_write().map_err(db_err)?;

        let outcome = {
            let mut table = write_txn.open_table(CUSTOMERS).map_err(db_err)?;
            op(&mut table)
        };

        match outcome {
            Ok(value) => {
                write_txn.commit().map_err(db_err)?;
                Ok(value)
            }
            Err(e) => {
                write_txn.abort().map_err(db_err)?;
                Err(e)
            }
        }
    }
}

/// Encode a customer's row value
pub(crate) fn encode_row(customer: &Customer) -> Result<Vec<u8>, StoreError> {
    let row = CustomerRow {
        attributes: customer.attributes.clone(),
        events: customer.events.clone(),
        last_updated: customer.last_updated,
    };
    postcard::to_allocvec(&row).map_err(|e| StoreError::serialization(e.to_string()))
}

/// Decode a row value stored under `id`
pub(crate) fn decode_row(id: CustomerId, bytes: &[u8]) -> Result<Customer, StoreError> {
    let row: CustomerRow =
        postcard::from_bytes(bytes).map_err(|e| StoreError::serialization(e.to_string()))?;
    Ok(Customer {
        id,
        attributes: row.attributes,
        events: row.events,
        last_updated: row.last_updated,
    })
}

/// Map any redb failure onto the transaction error kind
pub(crate) fn db_err(err: impl Display) -> StoreError {
    StoreError::transaction(err.to_string())
}
