mod entries;
mod schema;
mod types;

pub use entries::{EntryStore, DEFAULT_RECENT_LIMIT, DEFAULT_SEARCH_LIMIT};
pub use schema::Database;
pub use types::{EntryId, EntryStats, StorageError, StoredEntry};
