//! # HallPager — talk announcement pager
//!
//! Runs one polling tick and exits. Meant to be driven by cron or a systemd
//! timer every minute or so.
//!
//! Usage:
//!   hallpager                                    # Tick with ~/.hallpager/config.toml
//!   hallpager --config ./hallpager.toml          # Custom config
//!   hallpager --now 2026-12-27T10:50:00+01:00    # Pretend it is this instant
//!   hallpager --bootstrap --simulate             # Page the first large-room talk, log only

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use hallpager_core::HallPagerConfig;
use hallpager_core::config::{LogConfig, TransportMode, expand_path};
use hallpager_dispatch::schedule::source_from_config;
use hallpager_dispatch::transport::transport_from_config;
use hallpager_dispatch::{Dispatcher, PagingTransport};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

#[derive(Parser)]
#[command(
    name = "hallpager",
    version,
    about = "📟 HallPager — pages large-room talks shortly before they start"
)]
struct Cli {
    /// Config file (default: ~/.hallpager/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Simulated current time (RFC 3339), overrides run.simulated_now
    #[arg(long)]
    now: Option<String>,

    /// Match the first large-room talk regardless of time
    #[arg(long)]
    bootstrap: bool,

    /// Log calls instead of sending them
    #[arg(long)]
    simulate: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => HallPagerConfig::load_from(&expand_path(path))?,
        None => HallPagerConfig::load()?,
    };
    if cli.bootstrap {
        config.run.bootstrap = true;
    }
    if cli.simulate {
        config.delivery.mode = TransportMode::Simulated;
    }
    if cli.now.is_some() {
        config.run.simulated_now = cli.now.clone();
    }

    init_logging(&config.log, cli.verbose)?;
    config.validate()?;

    let simulated_now = config
        .run
        .simulated_now
        .as_deref()
        .map(parse_now)
        .transpose()?;
    let now = simulated_now.unwrap_or_else(Utc::now);
    if simulated_now.is_some() {
        tracing::info!("🕰️ Simulated clock: {}", now.to_rfc3339());
    }

    let transport: Arc<dyn PagingTransport> = Arc::from(transport_from_config(&config.delivery)?);
    let source = source_from_config(&config.schedule)?;
    tracing::info!(
        "📟 HallPager v{} ({} transport, store {})",
        env!("CARGO_PKG_VERSION"),
        transport.name(),
        expand_path(&config.store.path).display()
    );

    let mut dispatcher = Dispatcher::from_config(&config, transport, simulated_now.is_some());
    let summary = dispatcher
        .run_from_source(source.as_ref(), now)
        .await
        .context("tick aborted")?;

    tracing::debug!("📊 Queue stats: {:?}", dispatcher.queue().stats());
    tracing::debug!("📊 Tick summary: {:?}", summary);
    Ok(())
}

fn parse_now(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("invalid simulated time '{value}', expected RFC 3339"))
}

fn init_logging(log: &LogConfig, verbose: bool) -> Result<()> {
    let filter = if verbose {
        "hallpager=debug,hallpager_core=debug,hallpager_dispatch=debug"
    } else {
        "hallpager=info,hallpager_core=info,hallpager_dispatch=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let (writer, ansi) = match &log.file {
        Some(path) => {
            let path: PathBuf = expand_path(path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), log.ansi),
    };

    if log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_ansi(ansi)
            .with_writer(writer)
            .init();
    }
    Ok(())
}
