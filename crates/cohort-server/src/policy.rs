//! Request-level policy applied before calling the store.
//!
//! The store accepts any attributes and any positive page window; the
//! rules below belong to the HTTP surface only.

use std::num::NonZeroUsize;

use cohort_core::Attributes;
use serde::Deserialize;

use crate::error::ApiError;

/// Attribute every created or updated customer must carry.
pub const EMAIL_ATTRIBUTE: &str = "email";

/// Attribute defaulted to the current time when implausible.
pub const CREATED_AT_ATTRIBUTE: &str = "created_at";

/// Page size used when `per_page` is absent or invalid.
pub const DEFAULT_PER_PAGE: NonZeroUsize = match NonZeroUsize::new(25) {
    Some(n) => n,
    None => unreachable!(),
};

/// Reject attribute maps without a non-empty `email`.
pub fn require_email(attributes: &Attributes) -> Result<(), ApiError> {
    match attributes.get(EMAIL_ATTRIBUTE) {
        Some(email) if !email.is_empty() => Ok(()),
        _ => Err(ApiError::bad_request("email attribute is required")),
    }
}

/// Whether `value` looks like epoch seconds (nine or ten digits).
pub fn is_plausible_timestamp(value: &str) -> bool {
    value
        .parse::<i64>()
        .is_ok_and(|n| n > 99_999_999 && n < 10_000_000_000)
}

/// Set `created_at` to now unless it already holds a plausible timestamp.
pub fn default_created_at(attributes: &mut Attributes) {
    let plausible = attributes
        .get(CREATED_AT_ATTRIBUTE)
        .is_some_and(|value| is_plausible_timestamp(value));
    if !plausible {
        attributes.insert(
            CREATED_AT_ATTRIBUTE.to_string(),
            chrono::Utc::now().timestamp().to_string(),
        );
    }
}

/// Raw `page`/`per_page` query parameters.
///
/// Kept as strings so malformed values fall back to defaults instead of
/// rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: Option<String>,
    /// Page size.
    pub per_page: Option<String>,
}

/// A validated page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number.
    pub page: NonZeroUsize,
    /// Page size.
    pub per_page: NonZeroUsize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: NonZeroUsize::MIN,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl From<&PageQuery> for Pagination {
    fn from(query: &PageQuery) -> Self {
        let defaults = Self::default();
        Self {
            page: positive(query.page.as_deref()).unwrap_or(defaults.page),
            per_page: positive(query.per_page.as_deref()).unwrap_or(defaults.per_page),
        }
    }
}

fn positive(raw: Option<&str>) -> Option<NonZeroUsize> {
    raw?.trim().parse::<usize>().ok().and_then(NonZeroUsize::new)
}
