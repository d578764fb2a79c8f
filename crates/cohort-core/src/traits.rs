//! Store abstraction consumed by the serving layer

use std::num::NonZeroUsize;

use async_trait::async_trait;

use crate::attributes::Attributes;
use crate::customer::{Customer, CustomerId};
use crate::error::StoreError;

/// The customer store operations
///
/// Every call runs as one atomic transaction: readers never observe a
/// half-applied mutation. Listing is always ascending by id.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Look up a customer by id
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such customer exists.
    async fn get(&self, id: CustomerId) -> Result<Customer, StoreError>;

    /// List one page of customers in ascending id order
    ///
    /// Returns the customers at 1-based ordinal positions
    /// `(page - 1) * count + 1 ..= page * count`. The window is positional,
    /// not a range of id values; a page past the end is empty.
    async fn list(
        &self,
        page: NonZeroUsize,
        count: NonZeroUsize,
    ) -> Result<Vec<Customer>, StoreError>;

    /// Insert a new customer with no events, stamped with the current time
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the id is taken.
    async fn create(&self, id: CustomerId, attributes: Attributes)
    -> Result<Customer, StoreError>;

    /// Merge `attributes` into an existing customer; incoming values win
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such customer exists.
    async fn update(&self, id: CustomerId, attributes: Attributes)
    -> Result<Customer, StoreError>;

    /// Remove a customer
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such customer exists.
    async fn delete(&self, id: CustomerId) -> Result<(), StoreError>;

    /// Exact number of stored customers
    async fn total_customers(&self) -> Result<usize, StoreError>;

    /// One page of customers together with the total count
    ///
    /// Stores that can serve both from one snapshot override this so the
    /// total always describes the same state as the page.
    async fn list_with_total(
        &self,
        page: NonZeroUsize,
        count: NonZeroUsize,
    ) -> Result<(Vec<Customer>, usize), StoreError> {
        let total = self.total_customers().await?;
        let customers = self.list(page, count).await?;
        Ok((customers, total))
    }
}

/// Zero-based offset of the first row of a page, or `None` on overflow
pub fn page_offset(page: NonZeroUsize, count: NonZeroUsize) -> Option<usize> {
    (page.get() - 1).checked_mul(count.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the CustomerStore trait is object-safe
    fn _assert_object_safe(_: &dyn CustomerStore) {}

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(nz(1), nz(2)), Some(0));
        assert_eq!(page_offset(nz(3), nz(2)), Some(4));
        assert_eq!(page_offset(nz(usize::MAX), nz(2)), None);
    }
}
