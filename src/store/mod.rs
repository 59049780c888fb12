//! Capability store: channel catalog and per-model ability rows.
//!
//! The tables belong to the LLM proxy; this daemon only reads channels,
//! rewrites their `models` column, and replaces their ability rows.
//! The probing loop talks to the store through [`CapabilityStore`] so
//! it can run against SQLite in production and in tests alike.

use serde::{Deserialize, Serialize};

use std::sync::Arc;

use crate::error::{Error, Result};

pub mod sqlite;

/// Ability group stamped on every row we create.
pub const DEFAULT_GROUP: &str = "default";

// ── Rows ────────────────────────────────────────────────────────────

/// An upstream gateway as stored in the `channels` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    /// Discriminates URL construction (see `discovery::selector::ChannelKind`).
    pub channel_type: i64,
    pub name: String,
    pub base_url: String,
    /// Bearer credential. Never logged.
    #[serde(skip_serializing, default)]
    pub key: String,
    pub status: i64,
    /// Comma-joined model names from the last pass.
    pub models: String,
}

impl Channel {
    /// The stored model list, split on commas with blanks dropped.
    pub fn stored_models(&self) -> Vec<String> {
        self.models
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect()
    }
}

/// One (channel, model) capability row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    pub group: String,
    pub model: String,
    pub channel_id: i64,
    pub enabled: bool,
    pub priority: i64,
    pub weight: u64,
}

impl Ability {
    /// A fresh, enabled row in the default group.
    pub fn new(channel_id: i64, model: &str, cfg: ChannelConfig) -> Self {
        Self {
            group: DEFAULT_GROUP.to_string(),
            model: model.to_string(),
            channel_id,
            enabled: true,
            priority: cfg.priority,
            weight: cfg.weight,
        }
    }
}

/// Routing defaults carried from the previous pass onto new rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub priority: i64,
    pub weight: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { priority: 0, weight: 1 }
    }
}

// ── Store Trait ─────────────────────────────────────────────────────

pub trait CapabilityStore: Send + Sync {
    /// Live (not soft-deleted) channels whose type is in `types`, ordered by id.
    fn list_channels(&self, types: &[i64]) -> Result<Vec<Channel>>;

    /// Any one ability row of the channel, if it has one.
    fn find_one_ability(&self, channel_id: i64) -> Result<Option<Ability>>;

    /// Delete every ability row of the channel. Returns the number removed.
    fn delete_abilities(&self, channel_id: i64) -> Result<usize>;

    fn insert_ability(&self, ability: &Ability) -> Result<()>;

    /// Overwrite the channel's comma-joined `models` column.
    fn update_channel_models(&self, channel_id: i64, models: &str) -> Result<()>;

    /// Replace all ability rows of the channel with `abilities`.
    ///
    /// Stores that support transactions should override this so the
    /// delete and the inserts commit together.
    fn replace_abilities(&self, channel_id: i64, abilities: &[Ability]) -> Result<usize> {
        let removed = self.delete_abilities(channel_id)?;
        for ability in abilities {
            self.insert_ability(ability)?;
        }
        Ok(removed)
    }
}

/// Open the store named by `db_type` at `dsn`.
///
/// Only SQLite ships a driver; the other dialects the proxy supports are
/// recognized so the failure message is explicit.
pub fn open(db_type: &str, dsn: &str) -> Result<Arc<dyn CapabilityStore>> {
    match db_type.to_ascii_lowercase().as_str() {
        "sqlite" | "sqlite3" => Ok(Arc::new(sqlite::SqliteStore::open(dsn)?)),
        "mysql" | "postgres" | "postgresql" | "sqlserver" => {
            Err(Error::UnsupportedDatabase(db_type.to_string()))
        }
        other => Err(Error::Config(format!("unknown db_type '{}'", other))),
    }
}
