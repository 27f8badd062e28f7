use std::collections::HashSet;

use crate::feed::{Entry, EntryLink};
use crate::storage::StoredEntry;

/// Entries whose link is not yet stored, in their original order.
///
/// Matching is exact set membership on [`EntryLink`]; titles and dates play no
/// part. A link repeated within `parsed` is kept only at its first occurrence.
pub fn new_entries<I>(parsed: I, stored: &[StoredEntry]) -> Vec<Entry>
where
    I: IntoIterator<Item = Entry>,
{
    let mut known: HashSet<EntryLink> = stored.iter().map(|s| s.link.clone()).collect();
    parsed
        .into_iter()
        .filter(|entry| known.insert(entry.link.clone()))
        .collect()
}
