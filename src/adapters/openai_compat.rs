//! OpenAI-compatible gateway client over reqwest.

use async_trait::async_trait;

use super::*;
use crate::error::Error;

/// Longest slice of a failure body we keep for logs.
const MAX_ERROR_BODY: usize = 500;

pub struct OpenAICompatClient {
    client: reqwest::Client,
}

impl OpenAICompatClient {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for OpenAICompatClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Cut `body` to at most `max` bytes on a char boundary.
pub fn truncate_body(body: &str, max: usize) -> &str {
    if body.len() <= max {
        return body;
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

async fn endpoint_error(resp: reqwest::Response) -> Error {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Error::UnsupportedEndpoint {
        status,
        body: truncate_body(&body, MAX_ERROR_BODY).to_string(),
    }
}

#[async_trait]
impl ChannelClient for OpenAICompatClient {
    async fn list_models(&self, base_url: &str, key: &str) -> Result<Vec<String>> {
        let url = format!("{}/v1/models", base_url.trim_end_matches('/'));
        let resp = self
            .client
            .get(&url)
            .bearer_auth(key)
            .timeout(DISCOVERY_TIMEOUT)
            .send()
            .await?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(endpoint_error(resp).await);
        }
        let body = resp.bytes().await?;
        let list: ModelList =
            serde_json::from_slice(&body).map_err(|e| Error::Parse(e.to_string()))?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    async fn check_model(&self, url: &str, key: &str, model: &str) -> Result<()> {
        let resp = self
            .client
            .post(url)
            .bearer_auth(key)
            .timeout(HEALTH_CHECK_TIMEOUT)
            .json(&HealthCheckRequest::new(model))
            .send()
            .await?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(endpoint_error(resp).await);
        }
        Ok(())
    }
}
