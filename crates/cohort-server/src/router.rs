//! Customer API router setup.

use axum::Router;
use axum::extract::OriginalUri;
use axum::http::Method;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::routes;
use crate::state::AppState;

/// Creates the customer API router.
///
/// Every response carries an `x-request-id` header, generated when the
/// client did not send one. Handler panics become plain 500 responses.
pub fn customers_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::customers::routes())
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn not_found(uri: OriginalUri) -> ApiError {
    ApiError::NotFound {
        message: format!("not found: {}", uri.0.path()),
    }
}

async fn method_not_allowed(method: Method, uri: OriginalUri) -> ApiError {
    ApiError::MethodNotAllowed {
        message: format!("{method} is not allowed on {}", uri.0.path()),
    }
}
