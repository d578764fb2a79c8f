//! Route handlers for the customer API.

pub mod customers;
