//! Reconciler: writes a channel's verified model list back to the store.
//!
//! Ability rows are replaced wholesale rather than diffed. Operator-tuned
//! priority/weight survive because they are sampled from the old rows
//! (see [`default_config_for`]) before those rows are deleted.

use tracing::{info, warn};

use crate::error::Result;
use crate::store::{Ability, CapabilityStore, Channel, ChannelConfig};

/// Priority/weight to stamp on the channel's new rows: copied from any
/// existing row, else `{0, 1}`. Store errors degrade to the default.
pub fn default_config_for(store: &dyn CapabilityStore, channel_id: i64) -> ChannelConfig {
    match store.find_one_ability(channel_id) {
        Ok(Some(row)) => ChannelConfig { priority: row.priority, weight: row.weight },
        Ok(None) => ChannelConfig::default(),
        Err(e) => {
            warn!(channel_id = channel_id, "Failed to read channel defaults, using priority=0 weight=1: {}", e);
            ChannelConfig::default()
        }
    }
}

/// Persist `verified` for `channel`: rewrite `channels.models`, then
/// replace the ability rows. Stops at the first failing step.
pub fn reconcile(
    store: &dyn CapabilityStore,
    channel: &Channel,
    verified: &[String],
    cfg: ChannelConfig,
) -> Result<()> {
    store.update_channel_models(channel.id, &verified.join(","))?;

    let rows: Vec<Ability> = verified.iter().map(|m| Ability::new(channel.id, m, cfg)).collect();
    let removed = store.replace_abilities(channel.id, &rows)?;

    info!(
        channel_id = channel.id,
        removed = removed,
        added = rows.len(),
        priority = cfg.priority,
        weight = cfg.weight,
        "Abilities replaced"
    );
    Ok(())
}
