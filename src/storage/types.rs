use serde::Serialize;
use thiserror::Error;

use crate::feed::{Entry, EntryLink};

// ============================================================================
// Error Types
// ============================================================================

/// Storage errors with user-friendly messages
#[derive(Debug, Error)]
pub enum StorageError {
    /// Another process holds a lock on the database file
    #[error("Database is locked by another process")]
    Locked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StorageError {
    /// Map a sqlx error, singling out lock contention
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_error(&err.to_string()) {
            return StorageError::Locked;
        }
        StorageError::Other(err)
    }
}

// SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
pub(crate) fn is_lock_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Data Structures
// ============================================================================

/// Row identifier assigned by the store on insert
pub type EntryId = i64;

/// A feed entry that has been recorded.
///
/// `last_seen` is the time of the run that first observed the link. It is
/// written once and never refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredEntry {
    /// Row id; `None` until the entry has been inserted
    pub id: Option<EntryId>,
    pub title: String,
    pub link: EntryLink,
    pub publish_date: String,
    pub last_seen: String,
}

impl StoredEntry {
    pub fn from_entry(entry: &Entry, last_seen: &str) -> Self {
        Self {
            id: None,
            title: entry.title.clone(),
            link: entry.link.clone(),
            publish_date: entry.publish_date.clone(),
            last_seen: last_seen.to_string(),
        }
    }
}

/// Basic counts over the stored entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryStats {
    pub total: i64,
    /// Entries first seen on the current UTC day
    pub today: i64,
    /// Entries first seen in the current UTC month
    pub this_month: i64,
    /// `last_seen` of the most recently recorded entry
    pub last_updated: Option<String>,
}

/// Internal row type for entry queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EntryDbRow {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub publish_date: String,
    pub last_seen: String,
}

impl EntryDbRow {
    pub(crate) fn into_stored(self) -> StoredEntry {
        StoredEntry {
            id: Some(self.id),
            title: self.title,
            link: EntryLink::new(self.link),
            publish_date: self.publish_date,
            last_seen: self.last_seen,
        }
    }
}
