//! Daemon configuration: exclusion lists, fallback model list, schedule
//! and database location.
//!
//! Loaded once at startup and never reloaded. JSON is the native format;
//! files ending in `.yaml`/`.yml` are read as YAML.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "CHANNELPROBE_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Channel ids never probed.
    #[serde(default)]
    pub exclude_channel: Vec<i64>,
    /// Model ids dropped from live discovery results.
    #[serde(default)]
    pub exclude_model: Vec<String>,
    /// Fixed model list, used when discovery is forced off or has nothing to offer.
    #[serde(default)]
    pub models: Vec<String>,
    /// Skip `/v1/models` entirely and probe `models` only.
    #[serde(default)]
    pub force_models: bool,
    /// Interval between passes, Go duration syntax ("1h", "30m", "1h30m").
    pub time_period: String,
    pub db_type: String,
    pub db_dsn: String,
}

impl Config {
    /// Read and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;

        let config: Config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)
                .map_err(|e| Error::Config(format!("invalid YAML in {}: {}", path.display(), e)))?,
            _ => serde_json::from_str(&raw)
                .map_err(|e| Error::Config(format!("invalid JSON in {}: {}", path.display(), e)))?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.db_dsn.trim().is_empty() {
            return Err(Error::Config("db_dsn must not be empty".into()));
        }
        if self.force_models && self.models.is_empty() {
            return Err(Error::Config("force_models is set but models is empty".into()));
        }
        self.poll_interval()?;
        Ok(())
    }

    /// The parsed `time_period`.
    pub fn poll_interval(&self) -> Result<Duration> {
        let interval = parse_duration(&self.time_period)?;
        if interval.is_zero() {
            return Err(Error::Config("time_period must be positive".into()));
        }
        Ok(interval)
    }

    pub fn is_channel_excluded(&self, id: i64) -> bool {
        self.exclude_channel.contains(&id)
    }

    pub fn is_model_excluded(&self, model: &str) -> bool {
        self.exclude_model.iter().any(|m| m == model)
    }
}

/// Where to look for the config file: `$CHANNELPROBE_CONFIG`, then
/// `./config.json`, then the per-user config directory.
pub fn resolve_path() -> PathBuf {
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(p);
    }
    let local = PathBuf::from("config.json");
    if local.exists() {
        return local;
    }
    dirs::config_dir()
        .map(|d| d.join("channelprobe").join("config.json"))
        .unwrap_or(local)
}

/// Parse a Go-style duration: a sequence of `<number><unit>` pairs with
/// units `h`, `m`, `s`, `ms`. Fractions are allowed ("1.5h").
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(Error::Config("time_period is empty".into()));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let bad = || Error::Config(format!("invalid duration '{}'", raw));
    let mut total_ms = 0f64;
    let mut rest = s;

    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(bad)?;
        if num_len == 0 {
            return Err(bad());
        }
        let value: f64 = rest[..num_len].parse().map_err(|_| bad())?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let ms_per_unit = match &rest[..unit_len] {
            "h" => 3_600_000.0,
            "m" => 60_000.0,
            "s" => 1_000.0,
            "ms" => 1.0,
            _ => return Err(bad()),
        };
        rest = &rest[unit_len..];
        total_ms += value * ms_per_unit;
    }

    Ok(Duration::from_millis(total_ms.round() as u64))
}
