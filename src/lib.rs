//! Fetch Core Library
//!
//! Concurrent web page fetching with streaming metadata extraction. Each
//! page is retrieved once and its body streamed, in a single pass, both to
//! a content sink and through a tokenizer that counts links and images. The
//! counts are recorded per page in a metadata store.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`page`] - Page identity and metadata records
//! - [`fetch`] - HTTP retrieval with retry and cancellation
//! - [`extract`] - Streaming link and image counting
//! - [`tee`] - Read-through duplication of the page body
//! - [`sink`] - Destinations for raw page content
//! - [`db`] - Database connection and schema management
//! - [`store`] - Metadata persistence
//! - [`service`] - Batch orchestration and metadata queries

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod db;
pub mod extract;
pub mod fetch;
pub mod page;
pub mod service;
pub mod sink;
pub mod store;
pub mod tee;

// Re-export commonly used types
pub use db::{Database, DbError};
pub use extract::{ExtractError, extract};
pub use fetch::{
    CONNECT_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS, FetchError, FetchedContent, Fetcher, HttpFetcher,
    READ_TIMEOUT_SECS, RetryPolicy,
};
pub use page::{ExtractedMetadata, PageIdentity, PageMetadata};
pub use service::{
    BatchError, DEFAULT_CONCURRENCY, FetchService, MAX_CONCURRENCY, ServiceError, SiteError,
    SiteFailure,
};
pub use sink::{ContentSink, DiskSink, PageWriter, SinkError};
pub use store::{MetadataStore, SqliteMetadataStore, StoreError};
pub use tee::TeeReader;
