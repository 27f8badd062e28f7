use serde::Serialize;
use std::fmt;

// ============================================================================
// Entry Identity
// ============================================================================

/// The identity of a feed entry.
///
/// Links are the only deduplication key in the system. Wrapping the raw string
/// keeps a link from being compared against a title or a publish date. The
/// value is stored verbatim: no URL normalization, no well-formedness check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntryLink(String);

impl EntryLink {
    pub fn new(link: impl Into<String>) -> Self {
        Self(link.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryLink {
    fn from(link: &str) -> Self {
        Self::new(link)
    }
}

impl From<String> for EntryLink {
    fn from(link: String) -> Self {
        Self(link)
    }
}

// ============================================================================
// Entry
// ============================================================================

/// A feed item as parsed from the latest fetch.
///
/// All fields are raw strings taken from the markup. A sub-field missing from
/// the source is an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub title: String,
    pub link: EntryLink,
    pub publish_date: String,
}

impl Entry {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<EntryLink>,
        publish_date: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            publish_date: publish_date.into(),
        }
    }
}
