//! Error types for the fetch service.

use std::fmt;

use thiserror::Error;

use super::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::extract::ExtractError;
use crate::fetch::FetchError;
use crate::sink::SinkError;
use crate::store::StoreError;

/// Why one site of a batch failed.
#[derive(Debug, Error)]
pub enum SiteError {
    /// The page could not be retrieved.
    #[error("query page: {0}")]
    Fetch(#[from] FetchError),

    /// The page content could not be stored.
    #[error("store page: {0}")]
    Sink(#[from] SinkError),

    /// The page content could not be read or tokenized.
    #[error("export metadata: {0}")]
    Extract(#[from] ExtractError),

    /// The metadata could not be saved.
    #[error("save metadata: {0}")]
    Store(#[from] StoreError),

    /// The task processing the site panicked.
    #[error("site task panicked: {0}")]
    Panicked(String),
}

impl SiteError {
    /// Whether the site stopped because the batch was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Fetch(FetchError::Cancelled { .. }))
    }
}

/// A failed site together with its cause.
#[derive(Debug, Error)]
#[error("fetch site {site}: {error}")]
pub struct SiteFailure {
    /// The site as given by the caller.
    pub site: String,
    /// What went wrong.
    #[source]
    pub error: SiteError,
}

/// Aggregate outcome of a batch that did not fully succeed.
///
/// Holds one [`SiteFailure`] per failed site, in completion order, and
/// whether the batch was cut short by cancellation. Displays as the failures
/// joined by newlines.
#[derive(Debug, Default)]
pub struct BatchError {
    failures: Vec<SiteFailure>,
    cancelled: bool,
}

impl BatchError {
    /// Failures collected from the batch.
    #[must_use]
    pub fn failures(&self) -> &[SiteFailure] {
        &self.failures
    }

    /// Whether the batch was cancelled before every site finished.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub(super) fn push(&mut self, failure: SiteFailure) {
        self.failures.push(failure);
    }

    pub(super) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub(super) fn into_result(self) -> Result<(), Self> {
        if self.failures.is_empty() && !self.cancelled {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = self.failures.iter().map(ToString::to_string);
        if let Some(first) = lines.next() {
            f.write_str(&first)?;
            for line in lines {
                write!(f, "\n{line}")?;
            }
            if self.cancelled {
                f.write_str("\nbatch cancelled")?;
            }
        } else if self.cancelled {
            f.write_str("batch cancelled")?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}

/// Errors raised by the fetch service outside of a batch.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The metadata store failed.
    #[error("get metadata: {0}")]
    Store(#[from] StoreError),
}
