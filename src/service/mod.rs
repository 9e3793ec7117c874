//! Batch fetching of sites.
//!
//! [`FetchService`] coordinates the whole pipeline for a list of sites: each
//! site is retrieved, its body streamed to the content sink and through the
//! extractor in a single pass, and the resulting metadata saved to the store.
//!
//! # Concurrency
//!
//! - Every site runs as its own task in a [`JoinSet`]
//! - A semaphore shared by all batches caps how many sites are in flight
//! - One site's failure never stops the others; failures are aggregated into
//!   a [`BatchError`]
//! - Cancelling the token stops new sites from starting and aborts the ones
//!   in flight
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fetch_core::{Database, DiskSink, FetchService, HttpFetcher, RetryPolicy, SqliteMetadataStore};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new_in_memory().await?;
//! let service = FetchService::new(
//!     Arc::new(HttpFetcher::new(RetryPolicy::default())?),
//!     Arc::new(DiskSink::new(".")),
//!     Arc::new(SqliteMetadataStore::new(db)),
//! );
//! service
//!     .fetch_all(&["https://example.com".to_string()], &CancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod site;

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, info_span, instrument, warn};

use crate::fetch::Fetcher;
use crate::page::{PageIdentity, PageMetadata};
use crate::sink::ContentSink;
use crate::store::MetadataStore;

pub use error::{BatchError, ServiceError, SiteError, SiteFailure};
use site::SitePipeline;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default number of sites processed at once.
pub const DEFAULT_CONCURRENCY: usize = MAX_CONCURRENCY;

/// Fetches batches of sites and answers metadata queries.
///
/// Cloning is cheap; clones share the collaborators and the concurrency cap.
#[derive(Clone)]
pub struct FetchService {
    pipeline: Arc<SitePipeline>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    span: Span,
}

impl fmt::Debug for FetchService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchService")
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl FetchService {
    /// Creates a service with the default concurrency.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        sink: Arc<dyn ContentSink>,
        store: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            pipeline: Arc::new(SitePipeline {
                fetcher,
                sink,
                store,
            }),
            semaphore: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            concurrency: DEFAULT_CONCURRENCY,
            span: Span::none(),
        }
    }

    /// Sets how many sites may be processed at once.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self, ServiceError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(ServiceError::InvalidConcurrency { value: concurrency });
        }
        self.semaphore = Arc::new(Semaphore::new(concurrency));
        self.concurrency = concurrency;
        Ok(self)
    }

    /// Nests every span the service opens under `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetches every site in `sites`, storing content and metadata.
    ///
    /// Returns once every started site has finished. On cancellation no new
    /// site starts, and sites in flight stop reading and close their sink
    /// before this returns. Duplicate entries are processed independently.
    ///
    /// # Errors
    ///
    /// Returns a [`BatchError`] holding one [`SiteFailure`] per failed site.
    /// It is also returned, flagged as cancelled, when `cancel` fires before
    /// the batch completes.
    pub async fn fetch_all(
        &self,
        sites: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), BatchError> {
        let span = info_span!(parent: &self.span, "fetch_all", sites = sites.len());
        self.run_batch(sites, cancel, &span)
            .instrument(span.clone())
            .await
    }

    async fn run_batch(
        &self,
        sites: &[String],
        cancel: &CancellationToken,
        span: &Span,
    ) -> Result<(), BatchError> {
        let mut batch = BatchError::default();
        if sites.is_empty() {
            debug!("no sites to fetch");
            return Ok(());
        }

        let mut tasks = JoinSet::new();
        for site in sites {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok(),
            };
            // The semaphore is never closed, so only cancellation lands here.
            let Some(permit) = permit else {
                warn!(
                    started = tasks.len(),
                    "batch cancelled before all sites started"
                );
                batch.mark_cancelled();
                break;
            };

            let pipeline = Arc::clone(&self.pipeline);
            let cancel = cancel.clone();
            let site = site.clone();
            let site_span = info_span!(parent: span, "site", site = %site);
            tasks.spawn(
                async move {
                    let _permit = permit;
                    let outcome = AssertUnwindSafe(pipeline.run(&site, &cancel))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|payload| {
                            Err(SiteError::Panicked(panic_message(payload.as_ref())))
                        });
                    (site, outcome)
                }
                .instrument(site_span),
            );
        }

        let mut completed = 0usize;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled(), if !batch.is_cancelled() => {
                    warn!(
                        in_flight = tasks.len(),
                        "batch cancelled, waiting for sites in flight"
                    );
                    batch.mark_cancelled();
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok((site, Ok(metadata)))) => {
                        completed += 1;
                        info!(
                            site = %site,
                            links = metadata.num_links,
                            images = metadata.num_images,
                            "site fetched"
                        );
                    }
                    Some(Ok((site, Err(error))))
                        if error.is_cancelled() && cancel.is_cancelled() =>
                    {
                        debug!(site = %site, "site cancelled");
                    }
                    Some(Ok((site, Err(error)))) => {
                        let failure = SiteFailure { site, error };
                        error!(error = %failure, "failed to fetch site");
                        batch.push(failure);
                    }
                    Some(Err(join_error)) => {
                        error!(error = %join_error, "site task failed to join");
                    }
                    None => break,
                },
            }
        }

        info!(
            completed,
            failed = batch.failures().len(),
            cancelled = batch.is_cancelled(),
            "batch finished"
        );
        batch.into_result()
    }

    /// Looks up the stored metadata for `sites`.
    ///
    /// Each site is normalized to its identity first, so any variant of an
    /// address (query, fragment, trailing slash) finds the same record.
    /// Entries that are not absolute URLs and sites never fetched are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] if the lookup fails.
    #[instrument(parent = &self.span, skip_all, fields(sites = sites.len()))]
    pub async fn metadata_for(&self, sites: &[String]) -> Result<Vec<PageMetadata>, ServiceError> {
        let identities: Vec<PageIdentity> = sites
            .iter()
            .filter_map(|site| match PageIdentity::parse(site) {
                Ok(identity) => Some(identity),
                Err(error) => {
                    warn!(site = %site, error = %error, "skipping invalid site");
                    None
                }
            })
            .collect();

        self.pipeline
            .store
            .by_identities(&identities)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to get metadata");
                ServiceError::Store(e)
            })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
