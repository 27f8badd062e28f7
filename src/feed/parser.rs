use regex::Regex;
use std::sync::OnceLock;

use super::types::Entry;

/// Turns raw feed text into entries.
///
/// Implementations must be infallible: malformed items degrade to entries with
/// empty fields instead of errors, and empty input yields no entries. The
/// returned iterator is lazy and borrows the text, so each call re-parses from
/// scratch.
pub trait FeedParser: Send + Sync {
    fn parse<'a>(&self, text: &'a str) -> Box<dyn Iterator<Item = Entry> + 'a>;
}

/// Pattern-based parser for RSS `item` blocks.
///
/// Extracts the first `title`, `link` and `pubDate` of each item by pattern
/// matching instead of building a document model. Field contents are kept
/// verbatim apart from trimming surrounding whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternFeedParser;

struct Patterns {
    item: Regex,
    title: Regex,
    link: Regex,
    pub_date: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        item: Regex::new(r"(?s)<item(?:\s(?:[^>]*[^/>])?)?>(.*?)</item>")
            .expect("valid item regex"),
        title: field_pattern("title"),
        link: field_pattern("link"),
        pub_date: field_pattern("pubDate"),
    })
}

/// Matches `<tag>..</tag>`, allowing attributes on the open tag but never a
/// self-closing `<tag/>`.
fn field_pattern(tag: &str) -> Regex {
    Regex::new(&format!(r"(?s)<{tag}(?:\s(?:[^>]*[^/>])?)?>(.*?)</{tag}>"))
        .expect("valid field regex")
}

fn first_capture(pattern: &Regex, block: &str) -> String {
    pattern
        .captures(block)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

fn entry_from_block(block: &str) -> Entry {
    let p = patterns();
    Entry::new(
        first_capture(&p.title, block),
        first_capture(&p.link, block),
        first_capture(&p.pub_date, block),
    )
}

/// Lazily yields the entries of `text` in source order.
pub fn parse_entries(text: &str) -> impl Iterator<Item = Entry> + '_ {
    patterns()
        .item
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| entry_from_block(m.as_str()))
}

impl FeedParser for PatternFeedParser {
    fn parse<'a>(&self, text: &'a str) -> Box<dyn Iterator<Item = Entry> + 'a> {
        Box::new(parse_entries(text))
    }
}
