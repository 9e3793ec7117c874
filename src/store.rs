//! Persistence of page metadata.
//!
//! [`MetadataStore`] is the seam the fetch service records results through.
//! [`SqliteMetadataStore`] keeps one row per page identity in the
//! `page_metadata` table; saving an identity again replaces its row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::db::Database;
use crate::page::{PageIdentity, PageMetadata};

/// Identities looked up per query, well under SQLite's bound-parameter limit.
const LOOKUP_CHUNK_SIZE: usize = 500;

/// Errors raised by metadata stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database rejected the operation.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row does not describe valid metadata.
    #[error("invalid metadata row {id}: {reason}")]
    InvalidRow {
        /// Identity of the offending row.
        id: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Durable keyed storage for [`PageMetadata`].
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Inserts or replaces the record keyed by `metadata.identity`.
    async fn save(&self, metadata: &PageMetadata) -> Result<(), StoreError>;

    /// Returns the stored records for the given identities.
    ///
    /// Identities without a record are skipped. An empty input yields an
    /// empty result.
    async fn by_identities(
        &self,
        identities: &[PageIdentity],
    ) -> Result<Vec<PageMetadata>, StoreError>;
}

/// Raw `page_metadata` row.
#[derive(Debug, FromRow)]
struct MetadataRow {
    id: String,
    site: String,
    last_fetched: DateTime<Utc>,
    num_links: i64,
    num_images: i64,
}

impl TryFrom<MetadataRow> for PageMetadata {
    type Error = StoreError;

    fn try_from(row: MetadataRow) -> Result<Self, Self::Error> {
        let count = |value: i64, column: &str| {
            u64::try_from(value).map_err(|_| StoreError::InvalidRow {
                id: row.id.clone(),
                reason: format!("{column} is negative ({value})"),
            })
        };
        let num_links = count(row.num_links, "num_links")?;
        let num_images = count(row.num_images, "num_images")?;

        Ok(Self {
            identity: PageIdentity::from_parts(row.id, row.site),
            last_fetched: row.last_fetched,
            num_links,
            num_images,
        })
    }
}

/// SQLite-backed metadata store.
#[derive(Debug, Clone)]
pub struct SqliteMetadataStore {
    db: Database,
}

impl SqliteMetadataStore {
    /// Creates a store on top of an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    #[instrument(skip(self, metadata), fields(id = %metadata.identity))]
    async fn save(&self, metadata: &PageMetadata) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO page_metadata (id, site, last_fetched, num_links, num_images)
              VALUES (?, ?, ?, ?, ?)
              ON CONFLICT(id) DO UPDATE SET
                site = excluded.site,
                last_fetched = excluded.last_fetched,
                num_links = excluded.num_links,
                num_images = excluded.num_images",
        )
        .bind(metadata.identity.id())
        .bind(metadata.identity.site())
        .bind(metadata.last_fetched)
        .bind(i64::try_from(metadata.num_links).unwrap_or(i64::MAX))
        .bind(i64::try_from(metadata.num_images).unwrap_or(i64::MAX))
        .execute(self.db.pool())
        .await?;

        debug!(
            links = metadata.num_links,
            images = metadata.num_images,
            "saved page metadata"
        );
        Ok(())
    }

    #[instrument(skip(self, identities), fields(count = identities.len()))]
    async fn by_identities(
        &self,
        identities: &[PageIdentity],
    ) -> Result<Vec<PageMetadata>, StoreError> {
        let mut found = Vec::new();

        for chunk in identities.chunks(LOOKUP_CHUNK_SIZE) {
            let mut query = QueryBuilder::<Sqlite>::new(
                "SELECT id, site, last_fetched, num_links, num_images \
                 FROM page_metadata WHERE id IN (",
            );
            let mut ids = query.separated(", ");
            for identity in chunk {
                ids.push_bind(identity.id().to_string());
            }
            ids.push_unseparated(") ORDER BY id");

            let rows = query
                .build_query_as::<MetadataRow>()
                .fetch_all(self.db.pool())
                .await?;
            for row in rows {
                found.push(PageMetadata::try_from(row)?);
            }
        }

        debug!(found = found.len(), "looked up page metadata");
        Ok(found)
    }
}
