//! HTTP retrieval client.
//!
//! [`HttpFetcher`] issues one GET per attempt, validates the response and hands
//! back the live body as a stream. The body is never buffered here; the caller
//! decides where the bytes go.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{
    CONNECT_TIMEOUT_SECS, HTML_CONTENT_TYPE, READ_TIMEOUT_SECS, default_user_agent,
};
use super::error::FetchError;
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use super::{FetchedContent, Fetcher};
use crate::page::PageIdentity;

/// HTTP client for fetching HTML pages with retry support.
///
/// Created once and shared by every fetch of a batch so connections are
/// pooled. Cloning is cheap.
///
/// # Example
///
/// ```no_run
/// use fetch_core::fetch::{Fetcher, HttpFetcher, RetryPolicy};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = HttpFetcher::new(RetryPolicy::default())?;
/// let fetched = fetcher
///     .fetch("https://example.com", &CancellationToken::new())
///     .await?;
/// println!("Fetched {}", fetched.page);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry_policy: RetryPolicy,
}

impl HttpFetcher {
    /// Creates a fetcher with default timeouts (30s connect, 5min total).
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialized.
    pub fn new(retry_policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        Self::with_timeouts(retry_policy, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a fetcher with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialized.
    #[instrument(level = "debug", skip(retry_policy))]
    pub fn with_timeouts(
        retry_policy: RetryPolicy,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(default_user_agent())
            .build()?;
        Ok(Self::from_client(client, retry_policy))
    }

    /// Wraps an already configured reqwest client.
    #[must_use]
    pub fn from_client(client: Client, retry_policy: RetryPolicy) -> Self {
        Self {
            client,
            retry_policy,
        }
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// One GET request, validated.
    async fn fetch_once(&self, url: &Url) -> Result<FetchedContent, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::transport(url.as_str(), e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::status(url.as_str(), status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains(HTML_CONTENT_TYPE) {
            return Err(FetchError::content_type(url.as_str(), content_type));
        }

        // Identity follows redirects: the page is keyed by where it was served from.
        let page = PageIdentity::from_url(response.url());
        let body = Box::pin(response.bytes_stream().map_err(io::Error::other));

        Ok(FetchedContent::new(page, StreamReader::new(body)))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Fetches `site`, retrying transport failures and 5xx responses.
    ///
    /// Only the final outcome is returned; intermediate failures are logged.
    ///
    /// # Errors
    ///
    /// Returns the last [`FetchError`] once the retry policy gives up, or
    /// [`FetchError::Cancelled`] as soon as `cancel` fires.
    #[instrument(skip(self, cancel), fields(site = %site))]
    async fn fetch(
        &self,
        site: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedContent, FetchError> {
        let url = Url::parse(site.trim()).map_err(|_| FetchError::invalid_url(site))?;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting fetch");

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(FetchError::cancelled(site)),
                result = self.fetch_once(&url) => result,
            };

            let error = match result {
                Ok(fetched) => return Ok(fetched),
                Err(error) => error,
            };

            match self.retry_policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    info!(
                        attempt = next_attempt,
                        max_attempts = self.retry_policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying fetch"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(FetchError::cancelled(site)),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, attempts = attempt, "not retrying fetch");
                    return Err(error);
                }
            }
        }
    }
}
