use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use super::diff::new_entries;
use super::message::{failure_message, summary_message};
use crate::feed::{Entry, FeedFetcher, FeedParser, FetchError};
use crate::notify::Notifier;
use crate::storage::{EntryStore, StorageError, StoredEntry};

/// Errors that end a run early.
#[derive(Debug, Error)]
pub enum RunError {
    /// Another run of the same pipeline has not finished yet
    #[error("A run is already in progress")]
    AlreadyRunning,
    #[error("Failed to fetch feed: {0}")]
    Fetch(#[from] FetchError),
    /// The stored-entry snapshot could not be read
    #[error("Failed to read stored entries: {0}")]
    Storage(#[from] StorageError),
}

impl RunError {
    /// Short description of the failed step, used as the failure message headline.
    pub fn failed_step(&self) -> &'static str {
        match self {
            RunError::AlreadyRunning => "a check is already running",
            RunError::Fetch(_) => "failed to retrieve feed",
            RunError::Storage(_) => "failed to read stored entries",
        }
    }
}

/// Stages of a run, in order. `Failed` is reachable from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunStage {
    Fetching,
    Parsing,
    Diffing,
    Persisting,
    Notifying,
    Done,
    Failed,
}

/// Outcome of the summary notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationResult {
    /// Nothing new, nothing sent
    NotSent,
    Delivered,
    /// The sink could not be reached or refused the message
    Failed(String),
}

/// What a completed run did.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Entries recorded by this run, in feed order
    pub new_entries: Vec<Entry>,
    /// New entries whose insert failed; they stay unrecorded and come back next run
    pub failed_inserts: usize,
    pub notification: NotificationResult,
}

/// Text settings for the messages a pipeline sends.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Name of the watched source, used in failure messages
    pub source_name: String,
    /// Header line of the new-entries summary
    pub notification_title: String,
}

/// Entry point for an external timer.
///
/// The pipeline does not own a clock; whatever drives it on a schedule calls
/// this once per tick.
#[async_trait]
pub trait ScheduledRun: Send + Sync {
    async fn run_scheduled(&self);
}

/// Runs fetch → parse → diff → persist → notify.
///
/// Runs are strictly sequential: each stage completes before the next begins,
/// and a run that starts while another is in flight is refused with
/// [`RunError::AlreadyRunning`].
pub struct Orchestrator {
    settings: PipelineSettings,
    fetcher: Arc<dyn FeedFetcher>,
    parser: Arc<dyn FeedParser>,
    store: Arc<dyn EntryStore>,
    notifier: Arc<dyn Notifier>,
    run_lock: Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        settings: PipelineSettings,
        fetcher: Arc<dyn FeedFetcher>,
        parser: Arc<dyn FeedParser>,
        store: Arc<dyn EntryStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            fetcher,
            parser,
            store,
            notifier,
            run_lock: Mutex::new(()),
        }
    }

    /// Manual trigger: run the pipeline and return the entries it recorded.
    pub async fn check_now(&self) -> Result<Vec<Entry>, RunError> {
        self.run().await.map(|report| report.new_entries)
    }

    /// Run the pipeline once.
    ///
    /// A fetch failure or an unreadable store fails the run after one
    /// best-effort failure notification. Insert and summary-delivery failures
    /// do not fail the run; they are reported in the [`RunReport`].
    pub async fn run(&self) -> Result<RunReport, RunError> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| RunError::AlreadyRunning)?;

        match self.execute().await {
            Ok(report) => {
                enter(RunStage::Done);
                Ok(report)
            }
            Err(e) => {
                enter(RunStage::Failed);
                tracing::error!(source = %self.settings.source_name, error = %e, "Run failed");
                self.notify_failure(&e).await;
                Err(e)
            }
        }
    }

    async fn execute(&self) -> Result<RunReport, RunError> {
        enter(RunStage::Fetching);
        let text = self.fetcher.fetch().await?;

        enter(RunStage::Parsing);
        let parsed: Vec<Entry> = self.parser.parse(&text).collect();

        // Fresh snapshot every run; membership is never cached
        enter(RunStage::Diffing);
        let stored = self.store.list_all().await?;
        let candidates = new_entries(parsed, &stored);
        tracing::debug!(
            stored = stored.len(),
            new = candidates.len(),
            "Diffed feed against store"
        );

        enter(RunStage::Persisting);
        let (persisted, failed_inserts) = self.persist(candidates).await;

        enter(RunStage::Notifying);
        let notification = self.notify_summary(&persisted).await;

        tracing::info!(
            source = %self.settings.source_name,
            new = persisted.len(),
            failed_inserts = failed_inserts,
            "Run complete"
        );

        Ok(RunReport {
            new_entries: persisted,
            failed_inserts,
            notification,
        })
    }

    /// Insert each candidate, all stamped with one run timestamp.
    async fn persist(&self, candidates: Vec<Entry>) -> (Vec<Entry>, usize) {
        let last_seen = run_timestamp(Utc::now());
        let mut persisted = Vec::with_capacity(candidates.len());
        let mut failed = 0;

        for entry in candidates {
            let record = StoredEntry::from_entry(&entry, &last_seen);
            match self.store.insert(&record).await {
                Ok(id) => {
                    tracing::debug!(id = id, link = %entry.link, "Stored new entry");
                    persisted.push(entry);
                }
                Err(e) => {
                    // Still absent from the store, so the next run offers it again
                    tracing::warn!(link = %entry.link, error = %e, "Failed to store entry");
                    failed += 1;
                }
            }
        }

        (persisted, failed)
    }

    async fn notify_summary(&self, persisted: &[Entry]) -> NotificationResult {
        if persisted.is_empty() {
            return NotificationResult::NotSent;
        }

        let message = summary_message(&self.settings.notification_title, persisted);
        match self.notifier.notify(&message).await {
            Ok(()) => NotificationResult::Delivered,
            Err(e) => {
                tracing::error!(error = %e, entries = persisted.len(), "Failed to deliver summary");
                NotificationResult::Failed(e.to_string())
            }
        }
    }

    /// Best effort: a delivery failure here is logged and dropped.
    async fn notify_failure(&self, error: &RunError) {
        let message = failure_message(
            &self.settings.source_name,
            error.failed_step(),
            &error.to_string(),
        );
        if let Err(e) = self.notifier.notify(&message).await {
            tracing::warn!(error = %e, "Failed to deliver failure notification");
        }
    }
}

#[async_trait]
impl ScheduledRun for Orchestrator {
    async fn run_scheduled(&self) {
        match self.run().await {
            Ok(report) => tracing::debug!(
                new = report.new_entries.len(),
                notification = ?report.notification,
                "Scheduled run finished"
            ),
            Err(RunError::AlreadyRunning) => {
                tracing::warn!("Previous run still in progress, skipping this tick")
            }
            // Already logged and notified by run()
            Err(_) => {}
        }
    }
}

fn enter(stage: RunStage) {
    tracing::trace!(stage = ?stage, "Entering stage");
}

/// `last_seen` format: RFC 3339, UTC, millisecond precision
pub fn run_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}
