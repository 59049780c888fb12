//! Gateway client trait: the HTTP seam of the prober.
//!
//! Every channel we probe speaks the OpenAI-compatible surface
//! (`/v1/models`, `/v1/chat/completions`). The prober only ever calls
//! this trait, so tests can script gateway behavior without a network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

pub mod openai_compat;

/// Per-request timeout of a completions health check.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on a `/v1/models` call, body included. A stalled gateway must
/// not hold up the rest of the pass.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Prompt sent to every model under test.
pub const HEALTH_CHECK_PROMPT: &str = "Hello! Reply in short";

// ── Wire Types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Body of the health-check completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

impl HealthCheckRequest {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![Message {
                role: "user".into(),
                content: HEALTH_CHECK_PROMPT.into(),
            }],
        }
    }
}

/// `GET /v1/models` response body. Only ids matter.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelList {
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub id: String,
}

// ── Client Trait ────────────────────────────────────────────────────

#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Discover model ids via `GET {base_url}/v1/models`.
    ///
    /// Errors: `Transport` when the request cannot complete,
    /// `UnsupportedEndpoint` on a non-200 status, `Parse` on a body
    /// that is not a model list.
    async fn list_models(&self, base_url: &str, key: &str) -> Result<Vec<String>>;

    /// Send one health-check completion for `model` to `url`.
    /// `Ok(())` only on HTTP 200.
    async fn check_model(&self, url: &str, key: &str, model: &str) -> Result<()>;
}
