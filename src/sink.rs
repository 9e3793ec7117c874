//! Destinations for raw page content.
//!
//! A [`ContentSink`] hands out one writer per page. [`DiskSink`] lays pages
//! out as `<base_dir>/<location>.html`, where the location is the
//! percent-encoded site label, so every page is a single flat file.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncWrite, BufWriter};
use tracing::{debug, instrument};

/// Writable destination for one page, closed with `shutdown`.
pub type PageWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// File extension of stored pages.
const PAGE_EXTENSION: &str = "html";

/// Errors raised while storing page content.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The destination could not be created.
    #[error("create file {}: {source}", .path.display())]
    Open {
        /// Path that was being created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Writing page bytes into an open destination failed.
    #[error("write page {location}: {source}")]
    Write {
        /// Location of the page being written.
        location: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Opens destinations for page content.
#[async_trait]
pub trait ContentSink: Send + Sync {
    /// Opens a fresh destination for the page at `location`, replacing any
    /// previous content.
    async fn open(&self, location: &str) -> Result<PageWriter, SinkError>;
}

/// Stores pages as files under a base directory.
#[derive(Debug, Clone)]
pub struct DiskSink {
    base_dir: PathBuf,
}

impl DiskSink {
    /// Creates a sink rooted at `base_dir`. The directory is created on first
    /// use.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Directory the pages are written to.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the file holding the page at `location`.
    #[must_use]
    pub fn path_for(&self, location: &str) -> PathBuf {
        self.base_dir.join(format!("{location}.{PAGE_EXTENSION}"))
    }
}

#[async_trait]
impl ContentSink for DiskSink {
    #[instrument(skip(self), fields(base_dir = %self.base_dir.display()))]
    async fn open(&self, location: &str) -> Result<PageWriter, SinkError> {
        fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|source| SinkError::Open {
                path: self.base_dir.clone(),
                source,
            })?;

        let path = self.path_for(location);
        let file = File::create(&path)
            .await
            .map_err(|source| SinkError::Open {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), "opened page file");

        Ok(Box::new(BufWriter::new(file)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_path_for_appends_html_extension() {
        let sink = DiskSink::new("/data");
        assert_eq!(
            sink.path_for("www.google.com%2Fabout"),
            PathBuf::from("/data/www.google.com%2Fabout.html")
        );
    }

    #[tokio::test]
    async fn test_open_writes_page_file() {
        let temp_dir = TempDir::new().unwrap();
        let sink = DiskSink::new(temp_dir.path());

        let mut writer = sink.open("www.google.com").await.unwrap();
        writer.write_all(b"<html></html>").await.unwrap();
        writer.shutdown().await.unwrap();

        let stored = std::fs::read_to_string(temp_dir.path().join("www.google.com.html")).unwrap();
        assert_eq!(stored, "<html></html>");
    }

    #[tokio::test]
    async fn test_open_creates_missing_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("nested").join("pages");
        let sink = DiskSink::new(&base);

        let mut writer = sink.open("example.com").await.unwrap();
        writer.shutdown().await.unwrap();

        assert!(base.join("example.com.html").exists());
    }

    #[tokio::test]
    async fn test_open_truncates_previous_content() {
        let temp_dir = TempDir::new().unwrap();
        let sink = DiskSink::new(temp_dir.path());

        let mut writer = sink.open("example.com").await.unwrap();
        writer.write_all(b"a much longer first version").await.unwrap();
        writer.shutdown().await.unwrap();

        let mut writer = sink.open("example.com").await.unwrap();
        writer.write_all(b"short").await.unwrap();
        writer.shutdown().await.unwrap();

        let stored = std::fs::read_to_string(sink.path_for("example.com")).unwrap();
        assert_eq!(stored, "short");
    }

    #[tokio::test]
    async fn test_open_fails_when_base_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let sink = DiskSink::new(&blocker);
        let result = sink.open("example.com").await;
        assert!(matches!(result, Err(SinkError::Open { .. })));
    }
}
