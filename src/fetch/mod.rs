//! Page retrieval with retry support.
//!
//! This module provides the [`Fetcher`] seam used by the fetch service and its
//! HTTP implementation, [`HttpFetcher`].
//!
//! # Features
//!
//! - Streaming bodies (the page is never held in memory as a whole)
//! - Exponential backoff on transport failures and 5xx responses
//! - Status and Content-Type validation before any byte is handed out
//! - Cancellation through [`CancellationToken`]

mod client;
mod constants;
mod error;
mod retry;

use std::fmt;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::page::PageIdentity;

pub use client::HttpFetcher;
pub use constants::{CONNECT_TIMEOUT_SECS, HTML_CONTENT_TYPE, READ_TIMEOUT_SECS};
pub use error::FetchError;
pub use retry::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy,
    classify_error,
};

/// Readable page body, consumed once.
pub type PageStream = Box<dyn AsyncRead + Send + Unpin>;

/// A successfully fetched page: its identity and the still-open body.
///
/// Dropping the value releases the underlying connection.
pub struct FetchedContent {
    /// Identity of the page, derived from the final URL.
    pub page: PageIdentity,
    /// The response body.
    pub content: PageStream,
}

impl FetchedContent {
    /// Pairs a page identity with its body.
    pub fn new(page: PageIdentity, content: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            page,
            content: Box::new(content),
        }
    }
}

impl fmt::Debug for FetchedContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchedContent")
            .field("page", &self.page)
            .finish_non_exhaustive()
    }
}

/// Retrieves pages.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches one site, honoring `cancel`.
    async fn fetch(
        &self,
        site: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedContent, FetchError>;
}
