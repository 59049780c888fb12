//! channelprobe: keeps an LLM proxy's routing table honest.
//!
//! Periodically asks every eligible upstream channel which models it
//! serves, health-checks each one with a short completion, and writes
//! the survivors back to the proxy database:
//! - `channels.models` becomes the comma-joined verified list
//! - `abilities` rows for the channel are replaced, keeping the
//!   channel's existing priority/weight

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

mod adapters;
mod config;
mod discovery;
mod error;
mod store;

use adapters::openai_compat::OpenAICompatClient;
use config::Config;
use discovery::poller::{self, PassContext};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (structured logs)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "channelprobe=info".into()),
        )
        .with_target(false)
        .init();

    info!("🔎 channelprobe v{}", env!("CARGO_PKG_VERSION"));

    // ── Config ──────────────────────────────────────────────────────
    let config_path = config::resolve_path();
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let interval = config.poll_interval().context("Invalid time_period")?;

    info!(
        path = %config_path.display(),
        interval_secs = interval.as_secs(),
        force_models = config.force_models,
        excluded_channels = config.exclude_channel.len(),
        excluded_models = config.exclude_model.len(),
        "Config loaded"
    );

    // ── Store ───────────────────────────────────────────────────────
    let store = store::open(&config.db_type, &config.db_dsn)
        .with_context(|| format!("Failed to open {} database", config.db_type))?;
    info!(db_type = %config.db_type, "Database connected");

    // ── Poller ──────────────────────────────────────────────────────
    let ctx = PassContext {
        store,
        client: Arc::new(OpenAICompatClient::new()),
        config: Arc::new(config),
    };

    tokio::select! {
        _ = poller::run_poller(ctx, interval) => {}
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for shutdown signal")?;
            info!("Shutdown requested, exiting");
        }
    }

    Ok(())
}
