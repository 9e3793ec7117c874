//! Plain-text rendering of stored metadata.

use chrono::SecondsFormat;
use fetch_core::PageMetadata;

/// Renders one block per record, blocks separated by a blank line.
pub fn format_metadata(records: &[PageMetadata]) -> String {
    records
        .iter()
        .map(|record| {
            format!(
                "site: {}\nnum_links: {}\nimages: {}\nlast_fetch: {}\n",
                record.site(),
                record.num_links,
                record.num_images,
                record
                    .last_fetched
                    .to_rfc3339_opts(SecondsFormat::Secs, true)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
