//! HTTP client for the upstream chat service.

use std::time::Duration;

use async_trait::async_trait;
use jimmygate_core::UpstreamPayload;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};

use crate::config::ProxyConfig;
use crate::error::ProxyError;

/// Source of the raw upstream model list.
///
/// The model directory cache depends on this rather than on
/// [`UpstreamClient`] directly so tests can count and stall fetches.
#[async_trait]
pub trait ModelListSource: Send + Sync + std::fmt::Debug {
    /// Fetch the model list JSON.
    async fn fetch_models(&self) -> Result<Value, ProxyError>;
}

/// Client for the upstream model and chat endpoints, with a per-call deadline.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    models_url: String,
    chat_url: String,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(config: &ProxyConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(http: Client, config: &ProxyConfig) -> Self {
        Self {
            http,
            models_url: format!("{}{}", config.upstream_base_url, config.models_path),
            chat_url: format!("{}{}", config.upstream_base_url, config.chat_path),
            timeout: config.request_timeout,
        }
    }

    /// POST the chat payload and return the response once headers arrive.
    ///
    /// The deadline covers connecting, sending and waiting for the status
    /// line. A non-success status is turned into [`ProxyError::Upstream`].
    pub async fn send_chat(
        &self,
        payload: &UpstreamPayload,
    ) -> Result<reqwest::Response, ProxyError> {
        debug!("Forwarding chat to {}", self.chat_url);

        let request = self
            .http
            .post(&self.chat_url)
            .header("accept", "text/event-stream")
            .json(payload)
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ProxyError::Timeout)?
            .inspect_err(|e| error!("Failed to reach upstream chat: {e}"))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let raw = tokio::time::timeout(self.timeout, response.text())
            .await
            .map_err(|_| ProxyError::Timeout)?
            .unwrap_or_default();
        error!("Upstream chat returned {status}");
        Err(ProxyError::from_upstream_body(status.as_u16(), &raw))
    }

    async fn fetch_models_inner(&self) -> Result<Value, ProxyError> {
        let response = self
            .http
            .get(&self.models_url)
            .header("accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            error!("Upstream models returned {status}");
            return Err(ProxyError::from_upstream_body(status.as_u16(), &raw));
        }

        serde_json::from_str(&raw).map_err(|e| {
            error!("Upstream models body is not JSON: {e}");
            ProxyError::UpstreamMalformed("Upstream models response is not valid JSON".to_string())
        })
    }
}

#[async_trait]
impl ModelListSource for UpstreamClient {
    /// The deadline covers the whole fetch, body included.
    async fn fetch_models(&self) -> Result<Value, ProxyError> {
        debug!("Fetching model list from {}", self.models_url);
        tokio::time::timeout(self.timeout, self.fetch_models_inner())
            .await
            .map_err(|_| ProxyError::Timeout)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_join_base_and_paths() {
        let config = ProxyConfig::new()
            .with_upstream_base_url("http://upstream.local/")
            .with_models_path("/v2/models")
            .with_chat_path("/v2/chat");
        let client = UpstreamClient::new(&config);
        assert_eq!(client.models_url, "http://upstream.local/v2/models");
        assert_eq!(client.chat_url, "http://upstream.local/v2/chat");
    }
}
