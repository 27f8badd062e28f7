//! Feed retrieval and parsing.
//!
//! - [`fetcher`] - HTTP retrieval of the raw feed text with timeout and size limits
//! - [`parser`] - Pattern-based extraction of entries from the raw text
//! - [`types`] - The transient [`Entry`] and its [`EntryLink`] identity
//!
//! Both stages sit behind traits ([`FeedFetcher`], [`FeedParser`]) so the
//! pipeline can be driven by fakes in tests, and the pattern parser can be
//! replaced by a structured one without touching the rest of the pipeline.

mod fetcher;
mod parser;
mod types;

pub use fetcher::{FeedFetcher, FetchError, HttpFeedFetcher};
pub use parser::{parse_entries, FeedParser, PatternFeedParser};
pub use types::{Entry, EntryLink};
