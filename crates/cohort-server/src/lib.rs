//! # Cohort Server
//!
//! The serving adapter: maps HTTP requests onto [`CustomerStore`]
//! operations and applies request-level policy (required `email`,
//! `created_at` defaulting, page defaults). Also hosts the startup
//! composition (ingest, bulk load, serve) and the offline verifier.
//!
//! [`CustomerStore`]: cohort_core::CustomerStore

pub mod config;
pub mod error;
pub mod policy;
pub mod router;
pub mod routes;
pub mod startup;
pub mod state;
pub mod verify;

pub use config::{Cli, Command, ServeArgs, ServerConfig, VerifyArgs};
pub use error::{ApiError, ApiResult, ErrorDetail, ErrorResponse};
pub use router::customers_router;
pub use startup::{StartupError, load_store, run_serve, serve};
pub use state::AppState;
