use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{EntryDbRow, EntryId, EntryStats, StorageError, StoredEntry};

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Maximum number of entries returned from a bounded listing query
const MAX_ENTRIES: i64 = 1000;

pub const DEFAULT_RECENT_LIMIT: i64 = 50;
pub const DEFAULT_SEARCH_LIMIT: i64 = 20;

/// Durable collection of previously observed entries, keyed by link.
///
/// The store does not enforce link uniqueness. Callers that need it must
/// check `list_all` before inserting.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Every stored entry, in insertion order.
    async fn list_all(&self) -> Result<Vec<StoredEntry>, StorageError>;

    /// Append one entry and return its row id.
    async fn insert(&self, entry: &StoredEntry) -> Result<EntryId, StorageError>;
}

#[async_trait]
impl EntryStore for Database {
    async fn list_all(&self) -> Result<Vec<StoredEntry>, StorageError> {
        let rows = sqlx::query_as::<_, EntryDbRow>(
            r#"
            SELECT id, title, link, publish_date, last_seen
            FROM entries
            ORDER BY id ASC
        "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(rows.into_iter().map(EntryDbRow::into_stored).collect())
    }

    async fn insert(&self, entry: &StoredEntry) -> Result<EntryId, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO entries (title, link, publish_date, last_seen)
            VALUES (?, ?, ?, ?)
        "#,
        )
        .bind(&entry.title)
        .bind(entry.link.as_str())
        .bind(&entry.publish_date)
        .bind(&entry.last_seen)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(result.last_insert_rowid())
    }
}

impl Database {
    // ========================================================================
    // Entry Queries
    // ========================================================================

    /// The `limit` most recently recorded entries, oldest first.
    ///
    /// `limit` is capped at MAX_ENTRIES (1000).
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<StoredEntry>, StorageError> {
        let limit = limit.clamp(0, MAX_ENTRIES);
        let rows = sqlx::query_as::<_, EntryDbRow>(
            r#"
            SELECT id, title, link, publish_date, last_seen
            FROM (
                SELECT id, title, link, publish_date, last_seen
                FROM entries
                ORDER BY id DESC
                LIMIT ?
            )
            ORDER BY id ASC
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(rows.into_iter().map(EntryDbRow::into_stored).collect())
    }

    /// Entries whose title contains `term`, ignoring case, newest first.
    ///
    /// Matching runs in Rust rather than SQL because SQLite's `lower()` only
    /// folds ASCII.
    pub async fn search_by_title(
        &self,
        term: &str,
        limit: i64,
    ) -> Result<Vec<StoredEntry>, StorageError> {
        let limit = limit.clamp(0, MAX_ENTRIES) as usize;
        let needle = term.to_lowercase();

        let rows = sqlx::query_as::<_, EntryDbRow>(
            r#"
            SELECT id, title, link, publish_date, last_seen
            FROM entries
            ORDER BY last_seen DESC, id DESC
        "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;

        let matches: Vec<StoredEntry> = rows
            .into_iter()
            .filter(|row| row.title.to_lowercase().contains(&needle))
            .take(limit)
            .map(EntryDbRow::into_stored)
            .collect();

        tracing::debug!(term = %term, matches = matches.len(), "Title search");
        Ok(matches)
    }

    /// Counts of stored entries, relative to `now` (UTC).
    pub async fn stats(&self, now: DateTime<Utc>) -> Result<EntryStats, StorageError> {
        let day = now.format("%Y-%m-%d").to_string();
        let month = now.format("%Y-%m").to_string();

        let (total, today, this_month, last_updated): (i64, i64, i64, Option<String>) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN substr(last_seen, 1, 10) = ? THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN substr(last_seen, 1, 7) = ? THEN 1 ELSE 0 END), 0),
                    (SELECT last_seen FROM entries ORDER BY id DESC LIMIT 1)
                FROM entries
            "#,
            )
            .bind(&day)
            .bind(&month)
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;

        Ok(EntryStats {
            total,
            today,
            this_month,
            last_updated,
        })
    }
}
