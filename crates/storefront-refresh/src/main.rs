use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use storefront_cache::{RefreshPublisher, create_redis_pool};
use storefront_db_postgres::create_record_store;
use storefront_refresh::config::RefreshConfig;
use storefront_refresh::config::loader::{DEFAULT_CONFIG_PATH, load_config};
use storefront_refresh::{HttpProductFetcher, RefreshScheduler};

#[derive(Parser)]
#[command(name = "storefront-refresh")]
#[command(about = "Refresh product records from the upstream API")]
#[command(version)]
struct Cli {
    /// Configuration file (sections: storage.postgres, redis, refresh, logging)
    #[arg(short, long, env = "STOREFRONT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    let cli = Cli::parse();

    let cfg = match load_config(Some(&cli.config)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    init_tracing(&cfg.logging.level);
    tracing::info!(path = %cli.config, "Configuration loaded");

    let scheduler = match bootstrap(&cfg).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Refresh initialization failed: {e:#}");
            std::process::exit(2);
        }
    };

    let outcome = scheduler.run().await;
    tracing::info!(
        started = outcome.started,
        pending = outcome.pending,
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        "refresh stopped by watchdog"
    );
    std::process::exit(outcome.exit_code());
}

async fn bootstrap(cfg: &RefreshConfig) -> Result<RefreshScheduler> {
    let records = create_record_store(&cfg.storage.postgres)
        .await
        .context("failed to connect to the record store")?;

    let mut fetcher = HttpProductFetcher::new(
        &cfg.refresh.upstream.base_url,
        Duration::from_millis(cfg.refresh.upstream.request_timeout_ms),
        records,
    )?;

    // Notifications are optional; the records are refreshed either way
    if cfg.redis.enabled {
        match create_redis_pool(&cfg.redis).await {
            Ok(pool) => {
                tracing::info!(url = %cfg.redis.url, "publishing refresh notifications");
                fetcher = fetcher.with_publisher(RefreshPublisher::new(pool));
            }
            Err(e) => tracing::warn!(error = %e, "Redis unavailable, refresh notifications disabled"),
        }
    }

    let scheduler = RefreshScheduler::new(
        Arc::new(fetcher),
        cfg.refresh.products.clone(),
        cfg.refresh.base_interval(),
        cfg.refresh.timeout(),
    );
    scheduler.warn_if_misconfigured();
    Ok(scheduler)
}

fn init_tracing(level: &str) {
    // RUST_LOG, when set, wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
