//! redb-backed customer store
//!
//! Reads open a redb read transaction and therefore see a consistent
//! snapshot that concurrent commits cannot change. Mutations run on the
//! blocking pool since opening a write transaction waits for any other
//! writer to finish.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use cohort_core::{
    Attributes, Customer, CustomerId, CustomerStore, CustomerSummaries, StoreError, overlay,
    page_offset,
};
use redb::{ReadOnlyTable, ReadTransaction, ReadableTable, ReadableTableMetadata};
use tracing::{debug, info, instrument, trace, warn};

use crate::tables::{CUSTOMERS, CustomerDb, CustomerDbConfig, db_err, decode_row, encode_row};

/// Outcome of a bulk load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Customers written
    pub loaded: usize,
    /// User ids that could not be used as customer ids
    pub skipped: Vec<String>,
}

/// Customer store on an in-memory redb database
#[derive(Clone)]
pub struct RedbCustomerStore {
    db: Arc<CustomerDb>,
}

impl RedbCustomerStore {
    /// Create an empty store
    pub fn new() -> Result<Self, StoreError> {
        Self::with_config(CustomerDbConfig::default())
    }

    /// Create an empty store with a custom database configuration
    pub fn with_config(config: CustomerDbConfig) -> Result<Self, StoreError> {
        Ok(Self {
            db: Arc::new(CustomerDb::in_memory(config)?),
        })
    }

    /// Create a store holding one customer per summarized user
    pub fn from_summaries(
        summaries: &CustomerSummaries,
    ) -> Result<(Self, LoadReport), StoreError> {
        let store = Self::new()?;
        let report = store.bulk_load(summaries)?;
        Ok((store, report))
    }

    /// Write one customer per summarized user in a single transaction
    ///
    /// A user present in only one of the two summary maps gets empty
    /// attributes or events. `last_updated` is the winning attribute
    /// record's timestamp and stays unset for users without attributes.
    /// User ids that are not decimal integers, or that collide with an id
    /// already written by this load, are skipped and reported.
    #[instrument(skip_all, fields(users = summaries.user_count()))]
    pub fn bulk_load(&self, summaries: &CustomerSummaries) -> Result<LoadReport, StoreError> {
        let report = self.db.write_with(|table| {
            let mut report = LoadReport::default();
            let mut written = std::collections::HashSet::new();

            for user_id in summaries.user_ids() {
                let id = match user_id.trim().parse::<CustomerId>() {
                    Ok(id) if written.insert(id) => id,
                    Ok(id) => {
                        warn!(user_id, id, "Skipping user whose id collides with another user");
                        report.skipped.push(user_id.to_string());
                        continue;
                    }
                    Err(e) => {
                        warn!(user_id, error = %e, "Skipping user with non-numeric id");
                        report.skipped.push(user_id.to_string());
                        continue;
                    }
                };

                let mut customer = Customer::new(id, Attributes::new());
                if let Some(snapshot) = summaries.attributes.get(user_id) {
                    customer.attributes = snapshot.attributes.clone();
                    customer.last_updated = Some(snapshot.timestamp);
                }
                if let Some(events) = summaries.events.get(user_id) {
                    customer.events = events.clone();
                }

                table
                    .insert(id, encode_row(&customer)?.as_slice())
                    .map_err(db_err)?;
                report.loaded += 1;
            }

            Ok(report)
        })?;

        info!(
            loaded = report.loaded,
            skipped = report.skipped.len(),
            "Bulk loaded customers"
        );
        Ok(report)
    }

    /// Open a point-in-time view of the store
    pub fn snapshot(&self) -> Result<CustomerSnapshot, StoreError> {
        CustomerSnapshot::open(self.db.begin_read()?)
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&CustomerDb) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| StoreError::transaction(e.to_string()))?
    }
}

#[async_trait]
impl CustomerStore for RedbCustomerStore {
    async fn get(&self, id: CustomerId) -> Result<Customer, StoreError> {
        self.snapshot()?.get(id)
    }

    async fn list(
        &self,
        page: NonZeroUsize,
        count: NonZeroUsize,
    ) -> Result<Vec<Customer>, StoreError> {
        self.snapshot()?.list(page, count)
    }

    async fn create(
        &self,
        id: CustomerId,
        attributes: Attributes,
    ) -> Result<Customer, StoreError> {
        let customer = self
            .blocking(move |db| {
                db.write_with(|table| {
                    if table.get(id).map_err(db_err)?.is_some() {
                        return Err(StoreError::AlreadyExists(id));
                    }

                    let mut customer = Customer::new(id, attributes);
                    customer.touch();
                    table
                        .insert(id, encode_row(&customer)?.as_slice())
                        .map_err(db_err)?;
                    Ok(customer)
                })
            })
            .await?;

        debug!(id, "Created customer");
        Ok(customer)
    }

    async fn update(
        &self,
        id: CustomerId,
        attributes: Attributes,
    ) -> Result<Customer, StoreError> {
        let customer = self
            .blocking(move |db| {
                db.write_with(|table| {
                    let existing = table
                        .get(id)
                        .map_err(db_err)?
                        .map(|row| row.value().to_vec())
                        .ok_or(StoreError::NotFound(id))?;

                    let mut customer = decode_row(id, &existing)?;
                    overlay(&mut customer.attributes, attributes);
                    customer.touch();
                    table
                        .insert(id, encode_row(&customer)?.as_slice())
                        .map_err(db_err)?;
                    Ok(customer)
                })
            })
            .await?;

        debug!(id, "Updated customer");
        Ok(customer)
    }

    async fn delete(&self, id: CustomerId) -> Result<(), StoreError> {
        self.blocking(move |db| {
            db.write_with(|table| {
                let removed = table.remove(id).map_err(db_err)?.is_some();
                if removed {
                    Ok(())
                } else {
                    Err(StoreError::NotFound(id))
                }
            })
        })
        .await?;

        debug!(id, "Deleted customer");
        Ok(())
    }

    async fn total_customers(&self) -> Result<usize, StoreError> {
        self.snapshot()?.total_customers()
    }

    async fn list_with_total(
        &self,
        page: NonZeroUsize,
        count: NonZeroUsize,
    ) -> Result<(Vec<Customer>, usize), StoreError> {
        let snapshot = self.snapshot()?;
        Ok((snapshot.list(page, count)?, snapshot.total_customers()?))
    }
}

/// A consistent read-only view of the customer table
///
/// Commits made after the snapshot was opened are invisible to it.
pub struct CustomerSnapshot {
    table: ReadOnlyTable<CustomerId, &'static [u8]>,
    _txn: ReadTransaction,
}

impl CustomerSnapshot {
    fn open(txn: ReadTransaction) -> Result<Self, StoreError> {
        let table = txn.open_table(CUSTOMERS).map_err(db_err)?;
        Ok(Self { table, _txn: txn })
    }

    /// Look up a customer by id
    pub fn get(&self, id: CustomerId) -> Result<Customer, StoreError> {
        trace!(id, "Reading customer");
        match self.table.get(id).map_err(db_err)? {
            Some(row) => decode_row(id, row.value()),
            None => Err(StoreError::NotFound(id)),
        }
    }

    /// One page of customers in ascending id order
    pub fn list(
        &self,
        page: NonZeroUsize,
        count: NonZeroUsize,
    ) -> Result<Vec<Customer>, StoreError> {
        let Some(offset) = page_offset(page, count) else {
            return Ok(Vec::new());
        };

        self.table
            .iter()
            .map_err(db_err)?
            .skip(offset)
            .take(count.get())
            .map(|entry| {
                let (key, row) = entry.map_err(db_err)?;
                decode_row(key.value(), row.value())
            })
            .collect()
    }

    /// Number of customers in this snapshot
    pub fn total_customers(&self) -> Result<usize, StoreError> {
        let len = self.table.len().map_err(db_err)?;
        usize::try_from(len).map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use cohort_core::{AttributeSnapshot, EventCounts};

    use super::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn store_with_ids(ids: impl IntoIterator<Item = CustomerId>) -> RedbCustomerStore {
        let store = RedbCustomerStore::new().unwrap();
        for id in ids {
            store
                .create(id, attrs(&[("email", &format!("{id}@x.com"))]))
                .await
                .unwrap();
        }
        store
    }

    fn ids(customers: &[Customer]) -> Vec<CustomerId> {
        customers.iter().map(|c| c.id).collect()
    }

    #[tokio::test]
    async fn test_pagination_is_positional() {
        let store = store_with_ids([5, 3, 1, 4, 2]).await;

        assert_eq!(ids(&store.list(nz(1), nz(2)).await.unwrap()), vec![1, 2]);
        assert_eq!(ids(&store.list(nz(2), nz(2)).await.unwrap()), vec![3, 4]);
        assert_eq!(ids(&store.list(nz(3), nz(2)).await.unwrap()), vec![5]);
        assert!(store.list(nz(4), nz(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pagination_ignores_id_gaps() {
        let store = store_with_ids([10, 20, 30]).await;

        assert_eq!(ids(&store.list(nz(2), nz(1)).await.unwrap()), vec![20]);
        assert!(store.list(nz(usize::MAX), nz(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_incoming_values_win() {
        let store = RedbCustomerStore::new().unwrap();
        store
            .create(7, attrs(&[("email", "a@x.com"), ("tier", "S")]))
            .await
            .unwrap();

        let before = now_secs();
        let updated = store
            .update(7, attrs(&[("tier", "A"), ("city", "NY")]))
            .await
            .unwrap();

        assert_eq!(
            updated.attributes,
            attrs(&[("email", "a@x.com"), ("tier", "A"), ("city", "NY")])
        );
        assert!(updated.last_updated.unwrap() >= before);
        assert_eq!(store.get(7).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = RedbCustomerStore::new().unwrap();
        let err = store.update(1, Attributes::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let store = store_with_ids([1, 2, 3]).await;
        assert_eq!(store.total_customers().await.unwrap(), 3);

        store.delete(2).await.unwrap();

        assert!(store.get(2).await.unwrap_err().is_not_found());
        assert_eq!(store.total_customers().await.unwrap(), 2);
        assert!(store.delete(2).await.unwrap_err().is_not_found());
        assert_eq!(store.total_customers().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_create_is_rejected() {
        let store = store_with_ids([1]).await;
        let original = store.get(1).await.unwrap();

        let err = store.create(1, attrs(&[("email", "other@x.com")])).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(1)));
        assert_eq!(store.get(1).await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_create_has_no_events_and_a_timestamp() {
        let store = RedbCustomerStore::new().unwrap();
        let created = store.create(9, attrs(&[("email", "z@x.com")])).await.unwrap();

        assert!(created.events.is_empty());
        assert!(created.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_snapshot_ignores_later_commits() {
        let store = store_with_ids([1, 2]).await;
        let snapshot = store.snapshot().unwrap();

        store.delete(1).await.unwrap();
        store.create(3, Attributes::new()).await.unwrap();

        assert_eq!(snapshot.total_customers().unwrap(), 2);
        assert!(snapshot.get(1).is_ok());
        assert_eq!(ids(&snapshot.list(nz(1), nz(10)).unwrap()), vec![1, 2]);

        assert_eq!(
            ids(&store.list(nz(1), nz(10)).await.unwrap()),
            vec![2, 3]
        );
    }

    #[test]
    fn test_bulk_load_from_summaries() {
        let mut summaries = CustomerSummaries::default();
        summaries.attributes.insert(
            "5".into(),
            AttributeSnapshot {
                attributes: attrs(&[("a", "1"), ("b", "3")]),
                timestamp: 200,
                record_id: "r2".into(),
                position: 10,
            },
        );
        let mut five_events = EventCounts::new();
        five_events.insert("login".into(), 1);
        summaries.events.insert("5".into(), five_events);
        let mut six_events = EventCounts::new();
        six_events.insert("purchase".into(), 3);
        summaries.events.insert("6".into(), six_events);
        summaries.events.insert("not-a-number".into(), EventCounts::new());

        let (store, report) = RedbCustomerStore::from_summaries(&summaries).unwrap();
        assert_eq!(report.loaded, 2);
        assert_eq!(report.skipped, vec!["not-a-number".to_string()]);

        let snapshot = store.snapshot().unwrap();
        let five = snapshot.get(5).unwrap();
        assert_eq!(five.attributes, attrs(&[("a", "1"), ("b", "3")]));
        assert_eq!(five.events["login"], 1);
        assert_eq!(five.last_updated, Some(200));

        let six = snapshot.get(6).unwrap();
        assert!(six.attributes.is_empty());
        assert_eq!(six.events["purchase"], 3);
        assert_eq!(six.last_updated, None);
    }

    #[test]
    fn test_bulk_load_skips_colliding_ids() {
        let mut summaries = CustomerSummaries::default();
        let mut events = HashMap::new();
        events.insert("7".to_string(), EventCounts::new());
        events.insert("07".to_string(), EventCounts::new());
        summaries.events = events;

        let (store, report) = RedbCustomerStore::from_summaries(&summaries).unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped, vec!["7".to_string()]);
        assert_eq!(store.snapshot().unwrap().total_customers().unwrap(), 1);
    }

    fn now_secs() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }
}
