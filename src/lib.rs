//! Watches a syndication feed for entries it has not seen before.
//!
//! Each run fetches the feed, parses its items, drops every item whose link is
//! already stored, records the rest, and posts one summary message to a
//! webhook. See [`pipeline::Orchestrator`] for the run itself.

pub mod config;
pub mod feed;
pub mod notify;
pub mod pipeline;
pub mod storage;
pub mod util;
