//! Error types for page retrieval.

use thiserror::Error;

/// Errors that can occur while fetching a page.
///
/// Only [`FetchError::Transport`] and [`FetchError::ServerStatus`] are
/// retried; see [`classify_error`](super::classify_error).
#[derive(Debug, Error)]
pub enum FetchError {
    /// The site string is not an absolute URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid site string.
        url: String,
    },

    /// Network-level failure while sending the request (DNS, connect, TLS, timeout).
    #[error("do request {url}: {source}")]
    Transport {
        /// The URL being fetched.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The request could not be built or its redirects could not be followed.
    #[error("send request {url}: {source}")]
    Request {
        /// The URL being fetched.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a 5xx status.
    #[error("unexpected server error: HTTP {status} fetching {url}")]
    ServerStatus {
        /// The URL being fetched.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Any other status than 200 below 500.
    #[error("unexpected status code: HTTP {status} fetching {url}")]
    UnexpectedStatus {
        /// The URL being fetched.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response is not an HTML document.
    #[error("unexpected content type {content_type:?} fetching {url}")]
    UnexpectedContentType {
        /// The URL being fetched.
        url: String,
        /// The Content-Type header value, empty when absent.
        content_type: String,
    },

    /// The fetch was cancelled before it could complete.
    #[error("fetch of {url} cancelled")]
    Cancelled {
        /// The URL being fetched.
        url: String,
    },
}

impl FetchError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an error from a failed `send`.
    ///
    /// Redirect-policy and request-builder failures become
    /// [`FetchError::Request`]; everything else is a [`FetchError::Transport`].
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_redirect() || source.is_builder() {
            Self::Request { url, source }
        } else {
            Self::Transport { url, source }
        }
    }

    /// Creates a status error, split into server and non-server statuses.
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        let url = url.into();
        if status >= 500 {
            Self::ServerStatus { url, status }
        } else {
            Self::UnexpectedStatus { url, status }
        }
    }

    /// Creates a content type error.
    pub fn content_type(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::UnexpectedContentType {
            url: url.into(),
            content_type: content_type.into(),
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Returns the HTTP status carried by the error, if any.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::ServerStatus { status, .. } | Self::UnexpectedStatus { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

// No `From<reqwest::Error>`: every variant needs the URL for context.
