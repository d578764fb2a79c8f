//! API error types and error response payloads.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cohort_core::StoreError;
use serde::Serialize;
use tracing::error;

/// Error detail returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    /// Stable error code identifier.
    pub code: String,
    /// Human readable message.
    pub message: String,
}

/// Error response wrapper.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error detail.
    pub error: ErrorDetail,
}

/// Handler error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request was invalid.
    #[error("{message}")]
    BadRequest {
        /// Human readable message.
        message: String,
    },
    /// Customer or route not found.
    #[error("{message}")]
    NotFound {
        /// Human readable message.
        message: String,
    },
    /// Route exists but not for this method.
    #[error("{message}")]
    MethodNotAllowed {
        /// Human readable message.
        message: String,
    },
    /// Customer id already taken.
    #[error("{message}")]
    Conflict {
        /// Human readable message.
        message: String,
    },
    /// Internal error.
    #[error("{message}")]
    Internal {
        /// Human readable message.
        message: String,
    },
}

impl ApiError {
    /// Shorthand for a 400 response.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest { .. } => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::MethodNotAllowed { .. } => {
                (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED")
            }
            Self::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound {
                message: "customer not found".to_string(),
            },
            StoreError::AlreadyExists(id) => Self::Conflict {
                message: format!("customer {id} already exists"),
            },
            other => {
                error!(error = %other, "Store operation failed");
                Self::Internal {
                    message: other.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let payload = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, axum::Json(payload)).into_response()
    }
}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;
