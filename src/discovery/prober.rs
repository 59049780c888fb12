//! Model prober: resolves a channel's candidate models and health-checks
//! each one with a real completion call.
//!
//! Candidate resolution, first match wins:
//! 1. `force_models` → the configured list, no discovery call
//! 2. `GET /v1/models` succeeds → discovered ids minus `exclude_model`
//! 3. discovery fails → the channel's stored list, else the configured list
//!
//! Health checks run one model at a time. A failed model is dropped from
//! the result and never retried within the pass.

use std::collections::HashSet;
use tracing::{info, warn};

use crate::adapters::ChannelClient;
use crate::config::Config;
use crate::error::Error;
use crate::store::Channel;

/// Where the candidate list came from, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Forced,
    Discovered,
    StoredOnChannel,
    ConfigFallback,
}

/// Build the chat completions URL from a base URL, appending only the
/// segments that are missing. Applying it to its own output is a no-op.
pub fn completions_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.contains("/v1/chat/completions") {
        return base.to_string();
    }
    if base.ends_with("/chat") {
        return format!("{}/completions", base);
    }
    if base.ends_with("/v1") {
        return format!("{}/chat/completions", base);
    }
    format!("{}/v1/chat/completions", base)
}

/// Trim, drop blanks and drop repeats, keeping first occurrence order.
fn dedup(models: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    models
        .into_iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty() && seen.insert(m.clone()))
        .collect()
}

fn fallback_candidates(channel: &Channel, config: &Config) -> (Vec<String>, CandidateSource) {
    let stored = channel.stored_models();
    if !stored.is_empty() {
        info!(channel_id = channel.id, models = %channel.models, "Using channel's stored model list");
        (stored, CandidateSource::StoredOnChannel)
    } else {
        info!(channel_id = channel.id, "Stored model list empty, using configured models");
        (config.models.clone(), CandidateSource::ConfigFallback)
    }
}

/// Decide which models to health-check for `channel`.
pub async fn resolve_candidates(
    client: &dyn ChannelClient,
    channel: &Channel,
    config: &Config,
) -> (Vec<String>, CandidateSource) {
    if config.force_models {
        info!(channel_id = channel.id, "Forcing configured model list");
        return (dedup(config.models.clone()), CandidateSource::Forced);
    }

    let (models, source) = match client.list_models(&channel.base_url, &channel.key).await {
        Ok(ids) => {
            let kept = ids
                .into_iter()
                .filter(|id| {
                    if config.is_model_excluded(id) {
                        info!(channel_id = channel.id, model = %id, "Model excluded by config, skipping");
                        false
                    } else {
                        true
                    }
                })
                .collect();
            (kept, CandidateSource::Discovered)
        }
        Err(e @ Error::Parse(_)) => {
            warn!(channel_id = channel.id, channel = %channel.name, "Failed to parse model list: {}", e);
            fallback_candidates(channel, config)
        }
        Err(e) => {
            warn!(channel_id = channel.id, channel = %channel.name, "Failed to fetch model list: {}", e);
            fallback_candidates(channel, config)
        }
    };

    (dedup(models), source)
}

/// Health-check every candidate model of `channel`; return the ones
/// that answered HTTP 200, in candidate order.
pub async fn probe_channel(
    client: &dyn ChannelClient,
    channel: &Channel,
    config: &Config,
) -> Vec<String> {
    let (candidates, source) = resolve_candidates(client, channel, config).await;
    info!(
        channel_id = channel.id,
        channel = %channel.name,
        source = ?source,
        candidates = candidates.len(),
        "Probing models"
    );

    let url = completions_url(&channel.base_url);
    let mut verified = Vec::with_capacity(candidates.len());

    for model in candidates {
        info!(channel_id = channel.id, channel = %channel.name, model = %model, "Testing model");
        match client.check_model(&url, &channel.key, &model).await {
            Ok(()) => {
                info!(channel_id = channel.id, channel = %channel.name, model = %model, "✅ Model OK");
                verified.push(model);
            }
            Err(Error::UnsupportedEndpoint { status, body }) => {
                warn!(
                    channel_id = channel.id,
                    channel = %channel.name,
                    model = %model,
                    status = status,
                    body = %body,
                    "❌ Model check failed"
                );
            }
            Err(e) => {
                warn!(channel_id = channel.id, channel = %channel.name, model = %model, "❌ Request failed: {}", e);
            }
        }
    }

    verified
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted gateway: a fixed discovery answer and a set of models
    /// whose health check succeeds. Records every call.
    pub(crate) struct FakeGateway {
        pub listing: Result<Vec<String>>,
        pub healthy: HashMap<String, Vec<String>>,
        pub list_calls: Mutex<Vec<String>>,
        pub checks: Mutex<Vec<(String, String)>>,
    }

    impl FakeGateway {
        pub(crate) fn new(listing: Result<Vec<String>>) -> Self {
            Self {
                listing,
                healthy: HashMap::new(),
                list_calls: Mutex::new(Vec::new()),
                checks: Mutex::new(Vec::new()),
            }
        }

        /// Mark `models` healthy when reached at `url`.
        pub(crate) fn healthy_at(mut self, url: &str, models: &[&str]) -> Self {
            self.healthy
                .insert(url.to_string(), models.iter().map(|m| m.to_string()).collect());
            self
        }

        pub(crate) fn checked_models(&self) -> Vec<String> {
            self.checks.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
        }
    }

    #[async_trait]
    impl ChannelClient for FakeGateway {
        async fn list_models(&self, base_url: &str, _key: &str) -> Result<Vec<String>> {
            self.list_calls.lock().unwrap().push(base_url.to_string());
            match &self.listing {
                Ok(ids) => Ok(ids.clone()),
                Err(Error::Parse(m)) => Err(Error::Parse(m.clone())),
                Err(Error::UnsupportedEndpoint { status, body }) => {
                    Err(Error::UnsupportedEndpoint { status: *status, body: body.clone() })
                }
                Err(_) => Err(Error::Transport("connection refused".into())),
            }
        }

        async fn check_model(&self, url: &str, _key: &str, model: &str) -> Result<()> {
            self.checks.lock().unwrap().push((url.to_string(), model.to_string()));
            match self.healthy.get(url) {
                Some(models) if models.iter().any(|m| m == model) => Ok(()),
                _ => Err(Error::UnsupportedEndpoint { status: 404, body: "model not found".into() }),
            }
        }
    }

    fn channel(base_url: &str, models: &str) -> Channel {
        Channel {
            id: 5,
            channel_type: 1,
            name: "x".into(),
            base_url: base_url.into(),
            key: "sk".into(),
            status: 1,
            models: models.into(),
        }
    }

    #[test]
    fn test_completions_url_examples() {
        assert_eq!(completions_url("https://api.example.com"), "https://api.example.com/v1/chat/completions");
        assert_eq!(completions_url("https://api.example.com/v1"), "https://api.example.com/v1/chat/completions");
        assert_eq!(completions_url("https://api.example.com/v1/"), "https://api.example.com/v1/chat/completions");
        assert_eq!(completions_url("https://api.example.com/v1/chat"), "https://api.example.com/v1/chat/completions");
        assert_eq!(completions_url("https://gw.example/openai/chat"), "https://gw.example/openai/chat/completions");
        assert_eq!(
            completions_url("https://api.example.com/v1/chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_completions_url_idempotent() {
        for base in [
            "https://api.example.com",
            "https://api.example.com/",
            "https://api.example.com/v1",
            "https://api.example.com/proxy/v1/chat",
            "https://api.siliconflow.cn",
        ] {
            let once = completions_url(base);
            assert_eq!(completions_url(&once), once, "not idempotent for {}", base);
            assert_eq!(once.matches("/v1").count(), 1);
            assert_eq!(once.matches("/chat").count(), 1);
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let out = dedup(vec!["b".into(), " a ".into(), "b".into(), "".into(), "a".into()]);
        assert_eq!(out, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_forced_models_skip_discovery() {
        let gw = FakeGateway::new(Ok(vec!["live".into()]));
        let config = Config {
            force_models: true,
            models: vec!["m1".into(), "m2".into()],
            ..Default::default()
        };
        let (models, source) = resolve_candidates(&gw, &channel("https://x.com", "old"), &config).await;
        assert_eq!(models, vec!["m1", "m2"]);
        assert_eq!(source, CandidateSource::Forced);
        assert!(gw.list_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_discovered_models_minus_exclusions() {
        let gw = FakeGateway::new(Ok(vec!["gpt-a".into(), "embed".into(), "gpt-b".into()]));
        let config = Config { exclude_model: vec!["embed".into()], ..Default::default() };
        let (models, source) = resolve_candidates(&gw, &channel("https://x.com", ""), &config).await;
        assert_eq!(models, vec!["gpt-a", "gpt-b"]);
        assert_eq!(source, CandidateSource::Discovered);
        assert_eq!(*gw.list_calls.lock().unwrap(), vec!["https://x.com".to_string()]);
    }

    #[tokio::test]
    async fn test_discovery_failure_falls_back_to_stored_then_config() {
        let config = Config { models: vec!["cfg".into()], ..Default::default() };

        let gw = FakeGateway::new(Err(Error::Transport("refused".into())));
        let (models, source) = resolve_candidates(&gw, &channel("https://x.com", "a,b"), &config).await;
        assert_eq!(models, vec!["a", "b"]);
        assert_eq!(source, CandidateSource::StoredOnChannel);

        let gw = FakeGateway::new(Err(Error::UnsupportedEndpoint { status: 500, body: String::new() }));
        let (models, source) = resolve_candidates(&gw, &channel("https://x.com", ""), &config).await;
        assert_eq!(models, vec!["cfg"]);
        assert_eq!(source, CandidateSource::ConfigFallback);

        let gw = FakeGateway::new(Err(Error::Parse("expected value".into())));
        let (models, _) = resolve_candidates(&gw, &channel("https://x.com", "a"), &config).await;
        assert_eq!(models, vec!["a"]);
    }

    #[tokio::test]
    async fn test_stored_fallback_ignores_model_exclusions() {
        let config = Config { exclude_model: vec!["a".into()], ..Default::default() };
        let gw = FakeGateway::new(Err(Error::Transport("refused".into())));
        let (models, _) = resolve_candidates(&gw, &channel("https://x.com", "a,b"), &config).await;
        assert_eq!(models, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_probe_keeps_only_healthy_models_and_continues_after_failure() {
        let url = "https://x.com/v1/chat/completions";
        let gw = FakeGateway::new(Ok(vec!["bad".into(), "good".into(), "also-bad".into(), "good2".into()]))
            .healthy_at(url, &["good", "good2"]);

        let verified = probe_channel(&gw, &channel("https://x.com", ""), &Config::default()).await;
        assert_eq!(verified, vec!["good", "good2"]);
        // Every candidate checked exactly once, in order.
        assert_eq!(gw.checked_models(), vec!["bad", "good", "also-bad", "good2"]);
        assert!(gw.checks.lock().unwrap().iter().all(|(u, _)| u == url));
    }

    #[tokio::test]
    async fn test_empty_candidates_yield_empty_result() {
        let gw = FakeGateway::new(Ok(vec![]));
        let verified = probe_channel(&gw, &channel("https://x.com", "old"), &Config::default()).await;
        assert!(verified.is_empty());
        assert!(gw.checked_models().is_empty());
    }
}
