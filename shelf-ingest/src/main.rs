//! shelf-ingest - reading-history ingestion service
//!
//! Accepts a reading-history export over HTTP, enriches it from public book
//! catalogues and serves reading statistics and a book/author graph for it.
//! Nothing is persisted; every upload replaces the previous one.

use anyhow::{Context, Result};
use clap::Parser;
use shelf_common::config::{ConfigOverrides, ConfigResolver, ConfigSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shelf_ingest::enrichment::EnrichmentFetcher;
use shelf_ingest::{build_router, AppState};

/// Command-line arguments (highest configuration priority)
#[derive(Debug, Parser)]
#[command(name = "shelf-ingest", version, about = "Reading-history ingestion service")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    bind_address: Option<String>,

    /// Port to listen on
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Default log filter (RUST_LOG still wins)
    #[arg(long)]
    log_level: Option<String>,

    /// Concurrent enrichment lookups per job
    #[arg(long)]
    fetch_workers: Option<usize>,
}

impl From<Cli> for ConfigOverrides {
    fn from(cli: Cli) -> Self {
        Self {
            config_path: cli.config,
            bind_address: cli.bind_address,
            port: cli.port,
            log_level: cli.log_level,
            fetch_workers: cli.fetch_workers,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let resolved = ConfigResolver::new(cli.into()).resolve();
    let config = resolved.config;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting shelf-ingest v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    for warning in &resolved.warnings {
        warn!("Config: {}", warning);
    }
    match &resolved.source {
        ConfigSource::File(path) => info!("Config file: {}", path.display()),
        ConfigSource::Defaults => info!("No config file, using defaults"),
    }
    config.validate().context("Invalid configuration")?;

    let enricher = EnrichmentFetcher::from_config(&config)
        .context("Failed to initialize catalogue clients")?;
    info!(
        workers = config.fetch_workers,
        requests_per_second = config.requests_per_second,
        google_books_key = config.google_books_api_key.is_some(),
        "Enrichment configured"
    );

    let address = config.listen_address();
    let state = AppState::new(config, Arc::new(enricher));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;
    info!("Listening on http://{}", address);
    info!("Health check: http://{}/health", address);

    axum::serve(listener, app).await?;

    Ok(())
}
