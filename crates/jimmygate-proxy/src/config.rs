//! Gateway configuration.
//!
//! Built with builder-style `with_*` methods on top of [`Default`]. The
//! binary fills it from the environment; tests construct it directly.

use std::time::Duration;

use jimmygate_core::PromptDefaults;

/// Model used when a request names none.
pub const DEFAULT_MODEL: &str = "llama3.1-8B";

/// Configuration for the gateway.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Upstream base URL without trailing slash.
    pub(crate) upstream_base_url: String,
    /// Path of the upstream model list endpoint.
    pub(crate) models_path: String,
    /// Path of the upstream chat endpoint.
    pub(crate) chat_path: String,
    /// Static bearer token; `None` disables authentication.
    pub(crate) api_key: Option<String>,
    /// Prompt defaults merged into every upstream payload.
    pub(crate) prompt_defaults: PromptDefaults,
    /// Model used when the request does not name one.
    pub(crate) default_model: String,
    /// Deadline for each upstream call.
    pub(crate) request_timeout: Duration,
    /// Model list cache lifetime; zero disables caching.
    pub(crate) models_cache_ttl: Duration,
    /// Maximum accepted request body size in bytes.
    pub(crate) max_body_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream_base_url: "https://chatjimmy.ai".to_string(),
            models_path: "/api/models".to_string(),
            chat_path: "/api/chat".to_string(),
            api_key: None,
            prompt_defaults: PromptDefaults::default(),
            default_model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
            models_cache_ttl: Duration::from_secs(30),
            max_body_bytes: 2_000_000,
        }
    }
}

impl ProxyConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the upstream base URL. Trailing slashes are stripped.
    #[must_use]
    pub fn with_upstream_base_url(mut self, url: impl Into<String>) -> Self {
        self.upstream_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the upstream model list path.
    #[must_use]
    pub fn with_models_path(mut self, path: impl Into<String>) -> Self {
        self.models_path = path.into();
        self
    }

    /// Set the upstream chat path.
    #[must_use]
    pub fn with_chat_path(mut self, path: impl Into<String>) -> Self {
        self.chat_path = path.into();
        self
    }

    /// Require `Authorization: Bearer <key>`. An empty key disables auth.
    #[must_use]
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty());
        self
    }

    /// Set the default system prompt prepended to every request.
    #[must_use]
    pub fn with_default_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt_defaults.system_prompt = prompt.into();
        self
    }

    /// Set the default top-K. Zero is treated as unset.
    #[must_use]
    pub fn with_default_top_k(mut self, top_k: Option<u64>) -> Self {
        self.prompt_defaults.top_k = top_k.filter(|k| *k >= 1);
        self
    }

    /// Set the fallback model name.
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the upstream request deadline.
    ///
    /// Defaults to 120 seconds.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the model list cache lifetime. Zero disables caching.
    ///
    /// Defaults to 30 seconds.
    #[must_use]
    pub const fn with_models_cache_ttl(mut self, ttl: Duration) -> Self {
        self.models_cache_ttl = ttl;
        self
    }

    /// Set the maximum request body size.
    #[must_use]
    pub const fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn upstream_base_url(&self) -> &str {
        &self.upstream_base_url
    }

    pub fn auth_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}
