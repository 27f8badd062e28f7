//! Configuration file parser for ~/.config/feedwatch/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::util::validate_endpoint;

/// Environment variable that overrides `webhook_url` from the file
pub const WEBHOOK_URL_ENV: &str = "FEEDWATCH_WEBHOOK_URL";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("No webhook URL configured: set `webhook_url` or FEEDWATCH_WEBHOOK_URL")]
    MissingWebhook,

    #[error("Invalid {field}: {reason}")]
    InvalidUrl { field: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
///
/// Custom Debug impl masks `webhook_url`: incoming-webhook URLs carry their
/// own credential.
#[derive(Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed to watch.
    pub feed_url: String,

    /// Incoming-webhook endpoint for notifications.
    /// `FEEDWATCH_WEBHOOK_URL` takes precedence over the config file.
    #[serde(deserialize_with = "deserialize_secret")]
    pub webhook_url: Option<SecretString>,

    /// Name of the watched source, used in failure notifications.
    pub source_name: String,

    /// First line of the new-entries notification.
    pub notification_title: String,

    /// SQLite database path. Relative paths resolve against the config directory.
    pub database_path: PathBuf,

    /// Interval between scheduled checks in `watch` mode.
    pub check_interval_minutes: u64,

    /// Timeout applied to each feed fetch and each webhook delivery.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: "https://developers.google.com/feeds/google-ads-api-release-notes.xml"
                .to_string(),
            webhook_url: None,
            source_name: "Google Ads API".to_string(),
            notification_title: "New Google Ads API release notes".to_string(),
            database_path: PathBuf::from("entries.db"),
            check_interval_minutes: 24 * 60,
            request_timeout_secs: 30,
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("feed_url", &self.feed_url)
            .field("webhook_url", &self.webhook_url.as_ref().map(|_| "[REDACTED]"))
            .field("source_name", &self.source_name)
            .field("notification_title", &self.notification_title)
            .field("database_path", &self.database_path)
            .field("check_interval_minutes", &self.check_interval_minutes)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check size before reading so a huge file cannot exhaust memory
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "feed_url",
                "webhook_url",
                "source_name",
                "notification_title",
                "database_path",
                "check_interval_minutes",
                "request_timeout_secs",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), feed = %config.feed_url, "Loaded configuration");
        Ok(config)
    }

    /// Apply environment overrides (`FEEDWATCH_WEBHOOK_URL`).
    pub fn with_env_overrides(self) -> Self {
        self.with_webhook_override(std::env::var(WEBHOOK_URL_ENV).ok())
    }

    fn with_webhook_override(mut self, value: Option<String>) -> Self {
        if let Some(url) = value.filter(|v| !v.trim().is_empty()) {
            tracing::debug!("Using webhook URL from environment");
            self.webhook_url = Some(SecretString::from(url));
        }
        self
    }

    /// Check that both endpoints are usable http(s) URLs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.feed_url).map_err(|e| ConfigError::InvalidUrl {
            field: "feed_url",
            reason: e.to_string(),
        })?;

        let webhook = self.webhook_url.as_ref().ok_or(ConfigError::MissingWebhook)?;
        // The error reason must never echo the URL
        validate_endpoint(webhook.expose_secret()).map_err(|e| ConfigError::InvalidUrl {
            field: "webhook_url",
            reason: e.to_string(),
        })?;

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// `None` when scheduled checks are disabled (interval 0).
    pub fn check_interval(&self) -> Option<Duration> {
        (self.check_interval_minutes > 0)
            .then(|| Duration::from_secs(self.check_interval_minutes * 60))
    }

    /// Database path, resolved against `base_dir` when relative.
    pub fn resolved_database_path(&self, base_dir: &Path) -> PathBuf {
        if self.database_path.is_absolute() {
            self.database_path.clone()
        } else {
            base_dir.join(&self.database_path)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
