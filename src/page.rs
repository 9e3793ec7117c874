//! Page identity and metadata records.
//!
//! A [`PageIdentity`] is the canonical key for a fetched page. It is derived
//! from the page's address with the query and fragment removed, so every
//! component that needs to find a page (disk layout, metadata store, queries)
//! agrees on the same key.

use std::fmt;

use chrono::{DateTime, Utc};
use url::Url;

/// Canonical identity of a web page.
///
/// Built from `scheme://host[:port]/path`. The trailing slash of the path is
/// dropped so `https://example.com` and `https://example.com/` share an
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageIdentity {
    id: String,
    site: String,
    location: String,
}

impl PageIdentity {
    /// Derives the identity of a parsed URL.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let host = url.host_str().unwrap_or_default();
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let path = url.path().trim_end_matches('/');

        let site = format!("{authority}{path}");
        let id = format!("{}://{site}", url.scheme());
        let location = urlencoding::encode(&site).into_owned();

        Self { id, site, location }
    }

    /// Parses a site string and derives its identity.
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] if `site` is not an absolute URL.
    pub fn parse(site: &str) -> Result<Self, url::ParseError> {
        Url::parse(site.trim()).map(|url| Self::from_url(&url))
    }

    /// Rebuilds an identity from its stored parts.
    pub(crate) fn from_parts(id: String, site: String) -> Self {
        let location = urlencoding::encode(&site).into_owned();
        Self { id, site, location }
    }

    /// The canonical key, e.g. `https://www.example.com/about`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human readable label, e.g. `www.example.com/about`.
    #[must_use]
    pub fn site(&self) -> &str {
        &self.site
    }

    /// Filesystem-safe form of the site label, e.g. `www.example.com%2Fabout`.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl fmt::Display for PageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Structural metadata of one fetch of a page, as recorded in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMetadata {
    /// Page the metadata belongs to.
    pub identity: PageIdentity,
    /// When extraction of this fetch began.
    pub last_fetched: DateTime<Utc>,
    /// Number of `<a>` tags.
    pub num_links: u64,
    /// Number of `<img>` tags.
    pub num_images: u64,
}

impl PageMetadata {
    /// The site label of the page.
    #[must_use]
    pub fn site(&self) -> &str {
        self.identity.site()
    }
}

/// Counts produced by the extractor, not yet attached to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedMetadata {
    /// When extraction began.
    pub started_at: DateTime<Utc>,
    /// Number of `<a>` tags.
    pub num_links: u64,
    /// Number of `<img>` tags.
    pub num_images: u64,
}

impl ExtractedMetadata {
    /// Stamps the counts with the page they were extracted from.
    #[must_use]
    pub fn for_page(self, identity: PageIdentity) -> PageMetadata {
        PageMetadata {
            identity,
            last_fetched: self.started_at,
            num_links: self.num_links,
            num_images: self.num_images,
        }
    }
}
