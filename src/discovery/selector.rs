//! Channel selector: which channels take part in a pass, and at which
//! base URL they are probed.

use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::store::{CapabilityStore, Channel};

/// Fixed API root for SiliconFlow-compatible channels.
pub const SILICONFLOW_BASE_URL: &str = "https://api.siliconflow.cn";

/// Channel types the prober understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Generic OpenAI-compatible gateway; probed at its stored base URL.
    OpenAI,
    /// SiliconFlow-compatible; always probed at [`SILICONFLOW_BASE_URL`].
    SiliconFlow,
}

impl ChannelKind {
    /// Every type id the selector asks the store for.
    pub const TYPE_IDS: [i64; 3] = [1, 40, 999];

    pub fn from_type(channel_type: i64) -> Option<Self> {
        match channel_type {
            1 => Some(Self::OpenAI),
            40 | 999 => Some(Self::SiliconFlow),
            _ => None,
        }
    }
}

/// Load the channel catalog and keep the probe-able channels.
pub fn select_channels(store: &dyn CapabilityStore, config: &Config) -> Result<Vec<Channel>> {
    let rows = store.list_channels(&ChannelKind::TYPE_IDS)?;
    let channels = filter_channels(rows, config);

    if channels.is_empty() {
        warn!("No eligible channels found");
        return Ok(channels);
    }

    info!(count = channels.len(), "Selected channels");
    for c in &channels {
        info!(channel_id = c.id, channel = %c.name, channel_type = c.channel_type, "  - selected");
    }
    Ok(channels)
}

/// Apply the exclusion list and per-type base URL policy, keeping order.
pub fn filter_channels(rows: Vec<Channel>, config: &Config) -> Vec<Channel> {
    let mut selected = Vec::with_capacity(rows.len());

    for mut c in rows {
        if config.is_channel_excluded(c.id) {
            info!(channel_id = c.id, channel = %c.name, "Channel excluded by config, skipping");
            continue;
        }

        match ChannelKind::from_type(c.channel_type) {
            Some(ChannelKind::SiliconFlow) => {
                c.base_url = SILICONFLOW_BASE_URL.to_string();
                selected.push(c);
            }
            Some(ChannelKind::OpenAI) if c.base_url.trim().is_empty() => {
                info!(channel_id = c.id, channel = %c.name, "Channel has empty base_url, skipping");
            }
            Some(ChannelKind::OpenAI) => selected.push(c),
            None => {}
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::sqlite::{tests::add_channel, SqliteStore};
    use crate::store::Ability;

    fn channel(id: i64, channel_type: i64, base_url: &str) -> Channel {
        Channel {
            id,
            channel_type,
            name: format!("ch-{}", id),
            base_url: base_url.into(),
            key: "sk".into(),
            status: 1,
            models: String::new(),
        }
    }

    #[test]
    fn test_vendor_types_forced_to_fixed_endpoint() {
        let rows = vec![
            channel(1, 40, "https://evil.example"),
            channel(2, 999, ""),
        ];
        let out = filter_channels(rows, &Config::default());
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|c| c.base_url == SILICONFLOW_BASE_URL));
    }

    #[test]
    fn test_openai_without_base_url_dropped() {
        let rows = vec![
            channel(1, 1, ""),
            channel(2, 1, "   "),
            channel(3, 1, "https://x.com"),
        ];
        let out = filter_channels(rows, &Config::default());
        let ids: Vec<i64> = out.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3]);
        assert_eq!(out[0].base_url, "https://x.com");
    }

    #[test]
    fn test_excluded_ids_never_selected_and_order_kept() {
        let config = Config { exclude_channel: vec![2, 40], ..Default::default() };
        let rows = vec![
            channel(5, 1, "https://a"),
            channel(2, 1, "https://b"),
            channel(3, 40, ""),
            channel(40, 999, ""),
            channel(1, 1, "https://c"),
        ];
        let ids: Vec<i64> = filter_channels(rows, &config).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![5, 3, 1]);
    }

    #[test]
    fn test_unknown_types_ignored() {
        let out = filter_channels(vec![channel(1, 14, "https://x")], &Config::default());
        assert!(out.is_empty());
    }

    #[test]
    fn test_select_from_store() {
        let store = SqliteStore::in_memory().unwrap();
        let a = add_channel(&store, 1, "openai", "https://x.com", "");
        add_channel(&store, 1, "no-url", "", "");
        let c = add_channel(&store, 999, "sf", "https://stale.example", "");

        let out = select_channels(&store, &Config::default()).unwrap();
        let ids: Vec<i64> = out.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![a, c]);
        assert_eq!(out[1].base_url, SILICONFLOW_BASE_URL);
    }

    struct BrokenStore;

    impl CapabilityStore for BrokenStore {
        fn list_channels(&self, _: &[i64]) -> Result<Vec<Channel>> {
            Err(Error::StoreRead("no such table: channels".into()))
        }
        fn find_one_ability(&self, _: i64) -> Result<Option<Ability>> {
            Ok(None)
        }
        fn delete_abilities(&self, _: i64) -> Result<usize> {
            Ok(0)
        }
        fn insert_ability(&self, _: &Ability) -> Result<()> {
            Ok(())
        }
        fn update_channel_models(&self, _: i64, _: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_store_failure_surfaces() {
        let result = select_channels(&BrokenStore, &Config::default());
        assert!(matches!(result, Err(Error::StoreRead(_))));
    }
}
