//! Fixed-fixture customer store
//!
//! Seeded with two well-known customers so the serving layer can be run
//! and tested without ingesting a log.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use async_trait::async_trait;
use cohort_core::{
    Attributes, Customer, CustomerId, CustomerStore, EventCounts, StoreError, overlay,
    page_offset,
};
use tokio::sync::RwLock;
use tracing::trace;

/// In-memory store holding the fixture customers
#[derive(Debug)]
pub struct FixtureStore {
    customers: RwLock<BTreeMap<CustomerId, Customer>>,
}

impl Default for FixtureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureStore {
    /// Create a store seeded with the fixture customers
    pub fn new() -> Self {
        let customers = Self::fixtures()
            .into_iter()
            .map(|customer| (customer.id, customer))
            .collect();
        Self {
            customers: RwLock::new(customers),
        }
    }

    /// The seed customers, ids 1 and 2
    pub fn fixtures() -> Vec<Customer> {
        vec![
            fixture_customer(
                1,
                [
                    ("email", "customer1@example.com"),
                    ("tier", "S"),
                    ("type", "temporary"),
                    ("animal", "tiger"),
                ],
                5,
                1_625_181_700,
            ),
            fixture_customer(
                2,
                [
                    ("email", "customer2@example.com"),
                    ("tier", "A"),
                    ("type", "permanent"),
                    ("animal", "none"),
                ],
                1,
                1_625_180_000,
            ),
        ]
    }
}

fn fixture_customer(
    id: CustomerId,
    attributes: [(&str, &str); 4],
    played_song: u64,
    last_updated: i64,
) -> Customer {
    let attributes: Attributes = attributes
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let mut events = EventCounts::new();
    events.insert("played_song".to_string(), played_song);

    Customer::new(id, attributes)
        .with_events(events)
        .with_last_updated(last_updated)
}

#[async_trait]
impl CustomerStore for FixtureStore {
    async fn get(&self, id: CustomerId) -> Result<Customer, StoreError> {
        self.customers
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(
        &self,
        page: NonZeroUsize,
        count: NonZeroUsize,
    ) -> Result<Vec<Customer>, StoreError> {
        let Some(offset) = page_offset(page, count) else {
            return Ok(Vec::new());
        };
        Ok(self
            .customers
            .read()
            .await
            .values()
            .skip(offset)
            .take(count.get())
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        id: CustomerId,
        attributes: Attributes,
    ) -> Result<Customer, StoreError> {
        let mut customers = self.customers.write().await;
        if customers.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }

        let mut customer = Customer::new(id, attributes);
        customer.touch();
        customers.insert(id, customer.clone());
        trace!(id, "Created fixture customer");
        Ok(customer)
    }

    async fn update(
        &self,
        id: CustomerId,
        attributes: Attributes,
    ) -> Result<Customer, StoreError> {
        let mut customers = self.customers.write().await;
        let customer = customers.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        overlay(&mut customer.attributes, attributes);
        customer.touch();
        trace!(id, "Updated fixture customer");
        Ok(customer.clone())
    }

    async fn delete(&self, id: CustomerId) -> Result<(), StoreError> {
        self.customers
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn total_customers(&self) -> Result<usize, StoreError> {
        Ok(self.customers.read().await.len())
    }

    async fn list_with_total(
        &self,
        page: NonZeroUsize,
        count: NonZeroUsize,
    ) -> Result<(Vec<Customer>, usize), StoreError> {
        let customers = self.customers.read().await;
        let window = match page_offset(page, count) {
            Some(offset) => customers
                .values()
                .skip(offset)
                .take(count.get())
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok((window, customers.len()))
    }
}
