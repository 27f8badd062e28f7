//! The detect → dedup → persist → notify pipeline.
//!
//! - [`diff`] - Pure set difference of parsed entries against stored ones
//! - [`message`] - Text of the summary and failure notifications
//! - [`orchestrator`] - The run state machine that drives the other components

mod diff;
mod message;
mod orchestrator;

pub use diff::new_entries;
pub use message::{failure_message, summary_message};
pub use orchestrator::{
    run_timestamp, NotificationResult, Orchestrator, PipelineSettings, RunError, RunReport,
    ScheduledRun,
};
