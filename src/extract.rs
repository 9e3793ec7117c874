//! Streaming metadata extraction.
//!
//! The page is tokenized chunk by chunk with `lol_html`, which never builds a
//! DOM. Only start tags (self-closing included) are looked at: `a` counts as a
//! link, `img` as an image. Attributes are ignored.

use std::cell::Cell;
use std::io::{ErrorKind, Read};

use chrono::Utc;
use lol_html::errors::RewritingError;
use lol_html::{HtmlRewriter, Settings, element};
use thiserror::Error;
use tracing::{instrument, trace};

use crate::page::ExtractedMetadata;

/// Size of the chunks pulled from the reader.
const CHUNK_SIZE: usize = 8 * 1024;

/// Errors that can occur while extracting metadata.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Reading the page content failed.
    #[error("read page content: {0}")]
    Read(#[source] std::io::Error),

    /// The tokenizer rejected the content.
    #[error("parse html: {0}")]
    Tokenize(#[from] RewritingError),
}

/// Counts the links and images of an HTML document read from `reader`.
///
/// The returned counts are stamped with the time extraction started; the
/// caller attaches them to a page with [`ExtractedMetadata::for_page`].
/// End of input is the normal way out; any read error other than
/// [`ErrorKind::Interrupted`] aborts extraction.
///
/// # Errors
///
/// Returns [`ExtractError::Read`] if the reader fails and
/// [`ExtractError::Tokenize`] if the tokenizer gives up on the content.
///
/// # Example
///
/// ```
/// use fetch_core::extract::extract;
///
/// let html = r#"<p><a href="/">home</a><img src="logo.png"/></p>"#;
/// let metadata = extract(html.as_bytes()).unwrap();
/// assert_eq!(metadata.num_links, 1);
/// assert_eq!(metadata.num_images, 1);
/// ```
#[instrument(level = "debug", skip(reader))]
pub fn extract(mut reader: impl Read) -> Result<ExtractedMetadata, ExtractError> {
    let started_at = Utc::now();
    let links = Cell::new(0u64);
    let images = Cell::new(0u64);

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("a", |_el| {
                    links.set(links.get() + 1);
                    Ok(())
                }),
                element!("img", |_el| {
                    images.set(images.get() + 1);
                    Ok(())
                }),
            ],
            strict: false,
            ..Settings::new()
        },
        |_: &[u8]| {},
    );

    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ExtractError::Read(e)),
        };
        trace!(bytes = n, "tokenizing chunk");
        rewriter.write(&buf[..n])?;
    }
    rewriter.end()?;

    Ok(ExtractedMetadata {
        started_at,
        num_links: links.get(),
        num_images: images.get(),
    })
}
