//! Offline verification of a consolidated store against expected customers.
//!
//! The verification file holds one customer per line:
//! `id,key=value,key=value,...`. Values that parse as non-negative
//! integers are event counts, except `created_at` which is always an
//! attribute. `last_updated` is never compared.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use cohort_core::{Customer, CustomerId, CustomerStore, StoreError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::VerifyArgs;
use crate::policy::CREATED_AT_ATTRIBUTE;
use crate::startup::{StartupError, cancel_on_signal, load_store};

/// Page size used to walk the store.
const VERIFY_PAGE_SIZE: NonZeroUsize = match NonZeroUsize::new(10_000) {
    Some(n) => n,
    None => unreachable!(),
};

/// Errors raised by the `verify` command.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The verification file could not be read
    #[error("failed to read verify file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line is not `id,key=value,...`
    #[error("error on line {line} of verify file: {message}")]
    Line { line: usize, message: String },

    /// Ingesting the log failed
    #[error(transparent)]
    Startup(#[from] StartupError),

    /// Walking the consolidated store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A customer whose stored state differs from the expected state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Customer as described by the verification file
    pub expected: Customer,
    /// Customer as consolidated from the log
    pub actual: Customer,
}

/// Result of comparing a store against a verification file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Expected customers absent from the store.
    pub missing: Vec<CustomerId>,
    /// Stored customers absent from the file.
    pub extra: Vec<CustomerId>,
    /// Customers present in both with different attributes or events.
    pub mismatched: Vec<Mismatch>,
    /// Customers that matched exactly.
    pub matched: usize,
}

impl VerifyReport {
    /// True when every expected customer matched and nothing extra was stored
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.mismatched.is_empty()
    }
}

/// Parse verification file contents into expected customers keyed by id.
///
/// A later line for the same id replaces the earlier one.
pub fn parse_verify_file(contents: &str) -> Result<BTreeMap<CustomerId, Customer>, VerifyError> {
    let mut expected = BTreeMap::new();

    for (index, line) in contents.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let mut elements = line.split(',');
        let raw_id = elements.next().unwrap_or_default();
        let id = raw_id
            .trim()
            .parse::<CustomerId>()
            .map_err(|e| VerifyError::Line {
                line: line_no,
                message: format!("invalid id {raw_id:?}: {e}"),
            })?;

        let mut customer = Customer::new(id, Default::default());
        for element in elements.filter(|e| !e.is_empty()) {
            let mut parts = element.split('=');
            let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(VerifyError::Line {
                    line: line_no,
                    message: format!("malformed element {element:?}"),
                });
            };

            match value.parse::<u64>() {
                Ok(count) if key != CREATED_AT_ATTRIBUTE => {
                    customer.events.insert(key.to_string(), count);
                }
                _ => {
                    customer
                        .attributes
                        .insert(key.to_string(), value.to_string());
                }
            }
        }
        expected.insert(id, customer);
    }

    Ok(expected)
}

/// Compare every customer in `store` against `expected`.
pub async fn verify_store(
    store: &dyn CustomerStore,
    expected: &BTreeMap<CustomerId, Customer>,
) -> Result<VerifyReport, StoreError> {
    let mut actual = BTreeMap::new();
    let mut page = NonZeroUsize::MIN;
    loop {
        let customers = store.list(page, VERIFY_PAGE_SIZE).await?;
        if customers.is_empty() {
            break;
        }
        for mut customer in customers {
            customer.last_updated = None;
            actual.insert(customer.id, customer);
        }
        page = page.saturating_add(1);
    }

    let mut report = VerifyReport::default();
    for (id, want) in expected {
        match actual.get(id) {
            None => report.missing.push(*id),
            Some(got) if got == want => report.matched += 1,
            Some(got) => report.mismatched.push(Mismatch {
                expected: want.clone(),
                actual: got.clone(),
            }),
        }
    }
    report.extra = actual
        .keys()
        .filter(|id| !expected.contains_key(id))
        .copied()
        .collect();

    Ok(report)
}

/// The `verify` command: ingest, load, compare and log every discrepancy.
pub async fn run_verify(args: &VerifyArgs) -> Result<VerifyReport, VerifyError> {
    let contents =
        tokio::fs::read_to_string(&args.verify_file)
            .await
            .map_err(|source| VerifyError::Read {
                path: args.verify_file.clone(),
                source,
            })?;
    let expected = parse_verify_file(&contents)?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));
    let store = load_store(&args.data_file, &args.ingest_config(), cancel).await?;

    let report = verify_store(&store, &expected).await?;
    for id in &report.missing {
        error!(id, "Customer missing from store");
    }
    for id in &report.extra {
        error!(id, "Extra customer in store");
    }
    for mismatch in &report.mismatched {
        error!(
            id = mismatch.expected.id,
            expected = ?mismatch.expected,
            actual = ?mismatch.actual,
            "Customer does not match"
        );
    }
    info!(
        matched = report.matched,
        missing = report.missing.len(),
        extra = report.extra.len(),
        mismatched = report.mismatched.len(),
        "Verification finished"
    );

    Ok(report)
}
