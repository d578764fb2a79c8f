//! Error types for cohort stores

use thiserror::Error;

use crate::customer::CustomerId;

/// Errors returned by [`CustomerStore`](crate::CustomerStore) operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// No customer with this id exists
    #[error("customer not found: {0}")]
    NotFound(CustomerId),

    /// A customer with this id already exists
    #[error("customer already exists: {0}")]
    AlreadyExists(CustomerId),

    /// A transaction could not be opened or committed
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A stored row could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Create a new Transaction error
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction(message.into())
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Check whether this is the NotFound outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
