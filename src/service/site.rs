//! Processing of a single site: retrieve, store, extract, save.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};
use tokio::task;
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, warn};

use super::error::SiteError;
use crate::extract::{ExtractError, extract};
use crate::fetch::{FetchError, FetchedContent, Fetcher, PageStream};
use crate::page::{ExtractedMetadata, PageMetadata};
use crate::sink::{ContentSink, PageWriter, SinkError};
use crate::store::MetadataStore;
use crate::tee::TeeReader;

/// Collaborators shared by every site of a batch.
pub(super) struct SitePipeline {
    pub(super) fetcher: Arc<dyn Fetcher>,
    pub(super) sink: Arc<dyn ContentSink>,
    pub(super) store: Arc<dyn MetadataStore>,
}

impl SitePipeline {
    /// Runs one site to completion.
    ///
    /// The body is read once: every byte goes to the sink and the extractor
    /// in the same pass. The sink writer is closed before the body stream,
    /// on success, failure and cancellation alike. Reading the body stops as
    /// soon as `cancel` fires.
    pub(super) async fn run(
        &self,
        site: &str,
        cancel: &CancellationToken,
    ) -> Result<PageMetadata, SiteError> {
        let FetchedContent { page, content } = self.fetcher.fetch(site, cancel).await?;
        debug!(page = %page, "page retrieved");

        let writer = self.sink.open(page.location()).await?;

        let content = CancellableStream::new(content, cancel.clone());
        let (extracted, content, writer) =
            tee_and_extract(content, writer, page.location()).await?;
        if let Err(error) = close(writer).await {
            warn!(page = %page, error = %error, "failed to close page content");
        }
        let cancelled = content.was_cancelled();
        drop(content);

        if cancelled {
            debug!(page = %page, "page read cancelled");
            return Err(SiteError::Fetch(FetchError::cancelled(site)));
        }
        let metadata = extracted?.for_page(page);
        self.store.save(&metadata).await?;
        Ok(metadata)
    }
}

type TeeOutcome = (
    Result<ExtractedMetadata, SiteError>,
    CancellableStream,
    PageWriter,
);

/// Page body that fails every read once its token is cancelled.
struct CancellableStream {
    inner: PageStream,
    token: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    tripped: bool,
}

impl CancellableStream {
    fn new(inner: PageStream, token: CancellationToken) -> Self {
        let cancelled = Box::pin(token.clone().cancelled_owned());
        Self {
            inner,
            token,
            cancelled,
            tripped: false,
        }
    }

    /// Whether a read was refused because of cancellation.
    fn was_cancelled(&self) -> bool {
        self.tripped
    }

    fn refuse(&mut self) -> Poll<io::Result<()>> {
        self.tripped = true;
        Poll::Ready(Err(io::Error::other("page read cancelled")))
    }
}

impl AsyncRead for CancellableStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if this.token.is_cancelled() || this.cancelled.as_mut().poll(cx).is_ready() {
            return this.refuse();
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

/// Streams `content` into `writer` while extracting metadata from it.
///
/// The tokenizer is synchronous, so the copy runs on the blocking pool with
/// both ends bridged. The stream and writer are handed back for closing.
async fn tee_and_extract(
    content: CancellableStream,
    writer: PageWriter,
    location: &str,
) -> Result<TeeOutcome, SiteError> {
    let reader = SyncIoBridge::new(content);
    let writer = SyncIoBridge::new(writer);
    let location = location.to_string();

    task::spawn_blocking(move || {
        let mut tee = TeeReader::new(reader, writer);
        let extracted = extract(&mut tee);
        let write_failed = tee.write_failed();
        let (reader, writer) = tee.into_inner();

        let extracted = extracted.map_err(|error| match error {
            ExtractError::Read(source) if write_failed => {
                SiteError::Sink(SinkError::Write { location, source })
            }
            other => SiteError::Extract(other),
        });
        (extracted, reader.into_inner(), writer.into_inner())
    })
    .await
    .map_err(|e| SiteError::Panicked(e.to_string()))
}

async fn close(mut writer: PageWriter) -> std::io::Result<()> {
    writer.shutdown().await
}
