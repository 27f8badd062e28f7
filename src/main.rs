use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use feedwatch::config::Config;
use feedwatch::feed::{HttpFeedFetcher, PatternFeedParser};
use feedwatch::notify::WebhookNotifier;
use feedwatch::pipeline::{
    NotificationResult, Orchestrator, PipelineSettings, RunError, ScheduledRun,
};
use feedwatch::storage::{
    Database, StorageError, StoredEntry, DEFAULT_RECENT_LIMIT, DEFAULT_SEARCH_LIMIT,
};

/// Get the config directory path (~/.config/feedwatch/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedwatch"))
}

#[derive(Parser, Debug)]
#[command(name = "feedwatch", about = "Watch a feed and post new entries to a webhook")]
struct Args {
    /// Config file (default: ~/.config/feedwatch/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the feed once and print the entries recorded
    Check,
    /// Check the feed every `check_interval_minutes` until interrupted
    Watch,
    /// List the most recently recorded entries
    List {
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: i64,
    },
    /// Search recorded entries by title
    Search {
        term: String,
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: i64,
    },
    /// Show counts of recorded entries
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");
    }

    // User-only access: the config may hold the webhook URL
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?
        .with_env_overrides();

    let db = open_database(&config, &config_dir).await?;

    match args.command {
        Command::Check => {
            let orchestrator = build_orchestrator(&config, db)?;
            check(&orchestrator).await
        }
        Command::Watch => {
            let orchestrator = build_orchestrator(&config, db)?;
            let period = config
                .check_interval()
                .context("check_interval_minutes is 0; scheduled checks are disabled")?;
            watch(&orchestrator, period).await
        }
        Command::List { limit } => {
            print_entries(&db.list_recent(limit).await?);
            Ok(())
        }
        Command::Search { term, limit } => {
            let found = db.search_by_title(&term, limit).await?;
            if found.is_empty() {
                println!("No entries match '{}'", term);
            }
            print_entries(&found);
            Ok(())
        }
        Command::Stats => {
            let stats = db.stats(Utc::now()).await?;
            println!("Total:      {}", stats.total);
            println!("Today:      {}", stats.today);
            println!("This month: {}", stats.this_month);
            println!(
                "Last new:   {}",
                stats.last_updated.as_deref().unwrap_or("never")
            );
            Ok(())
        }
    }
}

async fn open_database(config: &Config, config_dir: &std::path::Path) -> Result<Database> {
    let db_path = config.resolved_database_path(config_dir);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;

    match Database::open(db_path_str).await {
        Ok(db) => Ok(db),
        Err(StorageError::Locked) => {
            anyhow::bail!("Database {} is locked by another process", db_path.display())
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database: {}", e)),
    }
}

fn build_orchestrator(config: &Config, db: Database) -> Result<Orchestrator> {
    config.validate().context("Invalid configuration")?;
    let webhook = config
        .webhook_url
        .as_ref()
        .context("No webhook URL configured")?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("feedwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let timeout = config.request_timeout();

    let fetcher = HttpFeedFetcher::new(client.clone(), config.feed_url.trim(), timeout);
    let notifier = WebhookNotifier::new(
        client,
        webhook.expose_secret().trim().to_string().into(),
        timeout,
    );

    Ok(Orchestrator::new(
        PipelineSettings {
            source_name: config.source_name.clone(),
            notification_title: config.notification_title.clone(),
        },
        Arc::new(fetcher),
        Arc::new(PatternFeedParser),
        Arc::new(db),
        Arc::new(notifier),
    ))
}

async fn check(orchestrator: &Orchestrator) -> Result<()> {
    let report = match orchestrator.run().await {
        Ok(report) => report,
        Err(RunError::AlreadyRunning) => anyhow::bail!("A check is already running"),
        Err(e) => return Err(e).context("Check failed"),
    };

    if report.new_entries.is_empty() {
        println!("No new entries.");
    } else {
        println!("{} new entries:", report.new_entries.len());
        for entry in &report.new_entries {
            println!("  {}  {}  ({})", entry.title, entry.link, entry.publish_date);
        }
    }

    if report.failed_inserts > 0 {
        eprintln!(
            "Warning: {} entries could not be stored and will be retried next check",
            report.failed_inserts
        );
    }
    if let NotificationResult::Failed(cause) = &report.notification {
        eprintln!("Warning: notification was not delivered: {}", cause);
    }
    Ok(())
}

async fn watch(port: &dyn ScheduledRun, period: Duration) -> Result<()> {
    tracing::info!(minutes = period.as_secs() / 60, "Watching feed");

    // First tick fires immediately, so the first check runs at startup
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => port.run_scheduled().await,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping");
                return Ok(());
            }
        }
    }
}

fn print_entries(entries: &[StoredEntry]) {
    for entry in entries {
        println!(
            "{}  {}\n    {}  ({})",
            entry.last_seen, entry.title, entry.link, entry.publish_date
        );
    }
}
