//! Pass driver: sweeps every eligible channel on a fixed interval.
//!
//! Runs once on startup and then every `time_period`. Within a pass,
//! channels are handled one at a time: resolve defaults, probe, then
//! reconcile. A failing channel is logged and skipped; only a failure to
//! load the channel catalog aborts the pass.

use chrono::Utc;
use std::sync::Arc;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{error, info, info_span, warn, Instrument};

use super::{prober, reconcile, selector};
use crate::adapters::ChannelClient;
use crate::config::Config;
use crate::error::Result;
use crate::store::CapabilityStore;

/// Everything a pass needs, passed explicitly instead of held globally.
#[derive(Clone)]
pub struct PassContext {
    pub store: Arc<dyn CapabilityStore>,
    pub client: Arc<dyn ChannelClient>,
    pub config: Arc<Config>,
}

/// Totals for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub channels: usize,
    pub reconciled: usize,
    pub failed: usize,
    pub models_verified: usize,
}

/// Run passes forever: one immediately, then one per `interval`.
pub async fn run_poller(ctx: PassContext, interval: Duration) {
    info!("📡 Channel prober starting, initial pass...");
    run_logged(&ctx).await;

    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // Skip the immediate tick (we already ran)

    loop {
        ticker.tick().await;
        info!("📡 Running scheduled pass...");
        run_logged(&ctx).await;
    }
}

async fn run_logged(ctx: &PassContext) {
    let span = info_span!("pass", pass_id = %uuid::Uuid::new_v4());
    if let Err(e) = run_pass(ctx).instrument(span).await {
        error!("Pass aborted: {}", e);
    }
}

/// Execute one full sweep over the selected channels.
pub async fn run_pass(ctx: &PassContext) -> Result<PassSummary> {
    let pass_start = Utc::now();
    let channels = selector::select_channels(ctx.store.as_ref(), &ctx.config)?;

    let mut summary = PassSummary { channels: channels.len(), ..Default::default() };

    for channel in &channels {
        info!(channel_id = channel.id, channel = %channel.name, "Probing channel");

        let cfg = reconcile::default_config_for(ctx.store.as_ref(), channel.id);
        info!(
            channel_id = channel.id,
            priority = cfg.priority,
            weight = cfg.weight,
            "Channel defaults"
        );

        let verified = prober::probe_channel(ctx.client.as_ref(), channel, &ctx.config).await;

        match reconcile::reconcile(ctx.store.as_ref(), channel, &verified, cfg) {
            Ok(()) => {
                summary.reconciled += 1;
                summary.models_verified += verified.len();
                info!(
                    channel_id = channel.id,
                    channel = %channel.name,
                    models = ?verified,
                    "Channel updated"
                );
            }
            Err(e) => {
                summary.failed += 1;
                warn!(channel_id = channel.id, channel = %channel.name, "Failed to update channel: {}", e);
            }
        }
    }

    let duration = (Utc::now() - pass_start).num_seconds();
    info!(
        channels = summary.channels,
        reconciled = summary.reconciled,
        failed = summary.failed,
        models_verified = summary.models_verified,
        duration_secs = duration,
        "📡 Pass complete"
    );

    Ok(summary)
}
