use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gamewarden::app::Config;
use gamewarden::control::{AnnounceOnlyControl, RestartAnnouncer};
use gamewarden::engine::{run_category, CategoryState, CheckpointStore, SharedStats};
use gamewarden::grammar::Event;
use gamewarden::relay::{DeliveryClient, DeliveryOutcome, DeliverySink};
use gamewarden::status::run_status_board;

/// Gamewarden - log-tailing event relay for dedicated game servers
#[derive(Parser)]
#[command(name = "gamewarden")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Tail all configured categories and relay events (default)
    Run,
    /// Load and validate the config file, then exit
    CheckConfig,
    /// Tail one category to stdout without delivering anything
    Tail {
        /// Category name from the config file
        category: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::CheckConfig) => check_config(),
        Some(Commands::Tail { category }) => tail(&category).await,
        Some(Commands::Run) | None => run().await,
    }
}

fn init_logging(level: &str) -> Result<()> {
    let log_dir = directories::ProjectDirs::from("", "", "gamewarden")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("gamewarden"));

    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::File::create(log_dir.join("gamewarden.log"))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(log_file))
        .init();

    Ok(())
}

fn check_config() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;
    println!("Config OK: {}", Config::config_path()?.display());
    println!("  {} categories configured", config.relay.categories.len());
    for category in &config.relay.categories {
        let state = if category.enabled { "enabled" } else { "disabled" };
        println!(
            "  - {} ({}, every {}s, {})",
            category.name,
            state,
            category.interval_secs,
            category.log_dir.display()
        );
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let mut delivery_config = config.discord.delivery_config();
    delivery_config.bot_token = config.bot_token();
    let client = Arc::new(DeliveryClient::new(delivery_config)?);
    let sink: Arc<dyn DeliverySink> = client.clone();

    let stats: SharedStats = Arc::new(Mutex::new(Default::default()));
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut handles = Vec::new();

    for category in config.relay.categories.iter().filter(|c| c.enabled) {
        let store = CheckpointStore::new(&config.relay.checkpoint_dir);
        let state = CategoryState::new(category.spec(), store)?;
        handles.push(tokio::spawn(run_category(
            state,
            sink.clone(),
            Duration::from_secs(category.interval_secs),
            stats.clone(),
            shutdown_rx.clone(),
        )));
    }
    if handles.is_empty() {
        warn!("No enabled categories configured, nothing to tail");
    }

    if let Some(status_channel) = config.discord.status_channel_id.clone() {
        handles.push(tokio::spawn(run_status_board(
            client.clone(),
            status_channel,
            Duration::from_secs(config.discord.status_interval_secs),
            Duration::from_secs(config.discord.min_edit_interval_secs),
            stats.clone(),
            shutdown_rx.clone(),
        )));
    }

    if config.restart.enabled {
        let announcer = RestartAnnouncer::new(
            client.clone(),
            Arc::new(AnnounceOnlyControl),
            config.restart.clone(),
        );
        handles.push(tokio::spawn(announcer.run(shutdown_rx.clone())));
    }

    info!("Gamewarden started ({} tasks)", handles.len());
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        let _ = handle.await;
    }
    info!("Gamewarden stopped");
    Ok(())
}

/// Sink for `tail`: prints events instead of delivering them.
struct PrintSink;

#[async_trait]
impl DeliverySink for PrintSink {
    async fn deliver(&self, _channel_id: &str, event: &Event) -> DeliveryOutcome {
        let mut parts = vec![event.actor.name.clone()];
        for (key, value) in &event.attributes {
            parts.push(format!("{key}={value}"));
        }
        println!(
            "[{}] {} {}: {}",
            event.category,
            event.timestamp.format("%H:%M:%S"),
            event.kind.title(),
            parts.join(" ")
        );
        DeliveryOutcome::Sent
    }
}

async fn tail(category: &str) -> Result<()> {
    let config = Config::load()?;
    let entry = config
        .relay
        .categories
        .iter()
        .find(|c| c.name == category)
        .ok_or_else(|| anyhow::anyhow!("Category '{}' is not configured", category))?;
    let spec = entry.spec();
    let interval = entry.interval_secs;

    // Dry run: park the checkpoints in a scratch directory so the real
    // relay's positions are untouched.
    let scratch = std::env::temp_dir().join("gamewarden-tail");
    let mut state = CategoryState::new(spec, CheckpointStore::new(scratch))?;

    println!("Tailing '{category}' (Ctrl-C to stop)");
    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                if let Err(e) = state.run_tick(&PrintSink).await {
                    warn!("Tick failed: {}", e);
                }
            }
        }
    }
    Ok(())
}
