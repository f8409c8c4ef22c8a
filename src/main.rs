//! # SitePulse Dispatcher
//!
//! Hourly cron entry point for the report dispatcher. Decides, per
//! subscriber and in that subscriber's timezone, who has entered their
//! delivery window, and sends each pending report exactly once per
//! period.
//!
//! Usage:
//!   sitepulse                              # dispatch at the current instant
//!   sitepulse 2026-01-05T14:15:00Z         # dispatch at an explicit instant
//!   sitepulse --config /etc/sitepulse.toml

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sitepulse_channels::EmailChannel;
use sitepulse_core::PulseConfig;
use sitepulse_reports::{DispatchPolicy, Dispatcher, HttpAssembler, ReportLedger, SqliteSubscribers};

#[derive(Parser)]
#[command(
    name = "sitepulse",
    version,
    about = "📈 SitePulse — periodic analytics report dispatcher"
)]
struct Cli {
    /// Reference instant (RFC 3339). Defaults to now.
    at: Option<String>,

    /// Path to config file (default: ~/.sitepulse/config.toml)
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "sitepulse=debug" } else { "sitepulse=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // "Now" is resolved here, at the trigger boundary. The core takes
    // the reference instant explicitly and never reads the clock.
    let at: DateTime<Utc> = match &cli.at {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| anyhow::anyhow!("invalid reference instant '{raw}': {e}"))?,
        None => Utc::now(),
    };

    let config = match &cli.config {
        Some(path) => PulseConfig::load_from(path)?,
        None => PulseConfig::load()?,
    };

    let data_dir =
        std::path::PathBuf::from(shellexpand::tilde(&config.storage.data_dir).to_string());
    std::fs::create_dir_all(&data_dir)?;

    let ledger = ReportLedger::open(&data_dir.join("ledger.db"))?;
    let subscribers = SqliteSubscribers::open(&data_dir.join("subscribers.db"))?;
    let assembler = HttpAssembler::new(&config.stats);
    let notifier = EmailChannel::new(config.smtp.clone());

    let policy = DispatchPolicy {
        send_hour: config.reports.send_hour,
        unsubscribe_base_url: config.reports.unsubscribe_base_url.clone(),
        call_timeout: std::time::Duration::from_secs(config.reports.call_timeout_secs),
    };

    let dispatcher = Dispatcher::new(&subscribers, &ledger, &assembler, &notifier, policy);
    let report = dispatcher.run(at).await?;

    tracing::info!(
        "✅ {} delivered, {} already sent, {} delivery-failed, {} failed",
        report.delivered,
        report.skipped_sent,
        report.delivery_failed,
        report.failed
    );
    Ok(())
}
