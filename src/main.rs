use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nostr_core::RelayClient;
use nostr_sdk::ToBech32;
use sangyou_bot::channels::{MentionRouter, Publisher, ReplyResolver, ResolverSettings};
use sangyou_bot::config::{Config, DEFAULT_CONFIG_FILE};
use sangyou_bot::providers::OpenAiSummarizer;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sangyou-bot")]
#[command(about = "Replies to Nostr mentions with a three-line summary of the referenced post")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot
    Run,
    /// Publish the profile metadata and exit
    Profile,
    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load_from_file(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;

    // Initialize logging
    init_logging(&config.log_level)?;

    // Validate configuration
    config
        .validate()
        .context("Configuration validation failed")?;

    // Default to run command if no subcommand specified
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_bot(config).await,
        Commands::Profile => publish_profile(config).await,
        Commands::Check => check_config(&config),
    }
}

async fn connect(config: &Config) -> Result<Arc<RelayClient>> {
    let keys = config.keys().context("Failed to load identity")?;
    tracing::info!(
        "Loaded identity: {}",
        keys.public_key().to_bech32().unwrap_or_default()
    );

    let relay = RelayClient::connect(
        keys,
        &config.relays,
        config.listen_relay(),
        config.connect_timeout(),
    )
    .await
    .context("Failed to connect to relays")?;

    Ok(Arc::new(relay))
}

async fn run_bot(config: Config) -> Result<()> {
    tracing::info!("Starting sangyou-bot v{}", env!("CARGO_PKG_VERSION"));

    let relay = connect(&config).await?;
    let keys = config.keys()?;
    let publisher = Publisher::new(relay.clone(), keys);

    if let Err(e) = publisher.publish_profile(&config.profile).await {
        tracing::warn!("Failed to publish profile: {}", e);
    }

    let summarizer = OpenAiSummarizer::new(
        config.openai_api_key.clone(),
        &config.openai_base_url,
        config.openai_model.clone(),
    )?;
    tracing::info!("Summarizing with model {}", summarizer.model());

    let resolver = ReplyResolver::new(
        relay.clone(),
        Arc::new(summarizer),
        ResolverSettings {
            min_content_chars: config.min_content_chars,
            lookup_timeout: config.lookup_timeout(),
            summarize_timeout: config.summarize_timeout(),
        },
    );
    let router = MentionRouter::new(
        relay.clone(),
        resolver,
        publisher,
        config.trigger_phrases.clone(),
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown().await {
            tracing::error!("Signal handling failed: {:#}", e);
        }
        tracing::info!("Received shutdown signal, stopping bot...");
        shutdown.cancel();
    });

    let result = router.run(cancel).await;

    // Graceful shutdown
    relay.shutdown().await;
    result.context("Mention loop failed")?;

    Ok(())
}

async fn publish_profile(config: Config) -> Result<()> {
    let relay = connect(&config).await?;
    let publisher = Publisher::new(relay.clone(), config.keys()?);

    let result = publisher.publish_profile(&config.profile).await;
    relay.shutdown().await;

    let report = result.context("Failed to publish profile")?;
    println!("✓ Profile published: {}", report.event_id);
    for url in &report.accepted {
        println!("  accepted by {}", url);
    }
    for (url, reason) in &report.rejected {
        println!("  rejected by {}: {}", url, reason);
    }

    Ok(())
}

fn check_config(config: &Config) -> Result<()> {
    println!("Testing configuration...");
    println!("✓ Configuration is valid");

    let keys = config.keys().context("Failed to load identity")?;
    println!("✓ Keys are valid");
    println!(
        "  Public key: {}",
        keys.public_key().to_bech32().unwrap_or_default()
    );
    println!("  Listen relay: {}", config.listen_relay());
    println!("  Relays: {}", config.relays.join(", "));
    println!("  Model: {}", config.openai_model);

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    // Wait for either SIGTERM or SIGINT
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("Failed to install SIGTERM handler")?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .context("Failed to install SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        },
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        },
        _ = signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C");
        }
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .compact(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}
