//! Shared state for request handlers

use std::sync::Arc;

use cohort_core::CustomerStore;

/// Shared state for customer handlers
#[derive(Clone)]
pub struct AppState {
    /// The store every request is served from
    pub store: Arc<dyn CustomerStore>,
}

impl AppState {
    /// Creates handler state around a store
    #[must_use]
    pub fn new(store: Arc<dyn CustomerStore>) -> Self {
        Self { store }
    }
}
