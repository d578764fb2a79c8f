//! Startup composition: signals, ingestion, bulk load, serving.

use std::future::IntoFuture;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cohort_core::{CustomerStore, StoreError};
use cohort_storage::{FixtureStore, RedbCustomerStore};
use cohort_stream::{IngestConfig, IngestError, ingest_file};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ServeArgs;
use crate::router::customers_router;
use crate::state::AppState;

/// Errors that abort startup or serving
#[derive(Debug, Error)]
pub enum StartupError {
    /// The log could not be parsed or consolidated
    #[error("ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    /// The store could not be built or loaded
    #[error("store initialization failed: {0}")]
    Store(#[from] StoreError),

    /// Binding or serving the listener failed
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ingest the log at `path` and bulk-load it into a fresh store
pub async fn load_store(
    path: &Path,
    config: &IngestConfig,
    cancel: CancellationToken,
) -> Result<RedbCustomerStore, StartupError> {
    let consolidated = ingest_file(path, config, cancel).await?;

    let summaries = consolidated.summaries;
    let (store, report) =
        tokio::task::spawn_blocking(move || RedbCustomerStore::from_summaries(&summaries))
            .await
            .map_err(|e| StoreError::transaction(e.to_string()))??;

    if !report.skipped.is_empty() {
        warn!(skipped = ?report.skipped, "Some users were not loaded");
    }
    Ok(store)
}

/// Serve the customer API on `listener` until `shutdown` fires
///
/// In-flight requests get `shutdown_timeout` to finish; after that the
/// server is abandoned and this returns.
pub async fn serve(
    listener: TcpListener,
    store: Arc<dyn CustomerStore>,
    shutdown_timeout: Duration,
    shutdown: CancellationToken,
) -> Result<(), StartupError> {
    let app = customers_router(AppState::new(store));
    info!(address = %listener.local_addr()?, "Listening");

    let graceful = {
        let shutdown = shutdown.clone();
        async move { shutdown.cancelled().await }
    };
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .into_future();

    let deadline = async {
        shutdown.cancelled().await;
        info!(timeout_secs = shutdown_timeout.as_secs(), "Shutting down");
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        result = server => result?,
        () = deadline => warn!("Graceful shutdown timed out, dropping open connections"),
    }

    info!("Server stopped");
    Ok(())
}

/// Cancel `token` on SIGINT or SIGTERM
pub async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
    token.cancel();
}

/// The `serve` command
///
/// Signals received while the log is still being ingested abort startup
/// with [`IngestError::Cancelled`]; nothing is served in that case.
pub async fn run_serve(args: ServeArgs) -> Result<(), StartupError> {
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let store: Arc<dyn CustomerStore> = if args.fixture {
        info!("Serving fixture customers");
        Arc::new(FixtureStore::new())
    } else {
        Arc::new(load_store(&args.data_file, &args.ingest_config(), cancel.clone()).await?)
    };

    let config = args.server_config();
    let listener = TcpListener::bind(config.listen).await?;
    serve(listener, store, config.shutdown_timeout, cancel).await
}
