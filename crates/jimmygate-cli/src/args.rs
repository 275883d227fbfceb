//! Command-line and environment configuration.

use std::time::Duration;

use clap::Parser;
use jimmygate_core::lenient::positive_int_str;
use jimmygate_proxy::{DEFAULT_MODEL, ProxyConfig};

const DEFAULT_MODELS_CACHE_TTL_MS: u64 = 30_000;

/// OpenAI-compatible gateway for a sentinel-delimited chat upstream.
///
/// Every option can also be set through the environment variable shown
/// (a `.env` file in the working directory is loaded first).
#[derive(Debug, Parser)]
#[command(name = "jimmygate", version, about)]
pub struct Cli {
    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Upstream base URL.
    #[arg(long, env = "UPSTREAM_BASE_URL", default_value = "https://chatjimmy.ai")]
    pub upstream_base_url: String,

    /// Upstream model list path.
    #[arg(long, env = "UPSTREAM_MODELS_PATH", default_value = "/api/models")]
    pub upstream_models_path: String,

    /// Upstream chat path.
    #[arg(long, env = "UPSTREAM_CHAT_PATH", default_value = "/api/chat")]
    pub upstream_chat_path: String,

    /// Bearer token clients must present. Empty disables auth.
    #[arg(long, env = "PROXY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// System prompt prepended to every request.
    #[arg(long, env = "CHATJIMMY_SYSTEM_PROMPT", default_value = "")]
    pub system_prompt: String,

    /// Default top-K; ignored unless a positive integer.
    #[arg(long, env = "CHATJIMMY_TOP_K")]
    pub top_k: Option<String>,

    /// Model used when a request names none.
    #[arg(long, env = "DEFAULT_MODEL", default_value = DEFAULT_MODEL)]
    pub default_model: String,

    /// Upstream request deadline in milliseconds.
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 120_000)]
    pub request_timeout_ms: u64,

    /// Model list cache lifetime in milliseconds; 0 disables caching.
    #[arg(long, env = "MODELS_CACHE_TTL_MS")]
    pub models_cache_ttl_ms: Option<String>,

    /// Maximum request body size in bytes.
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = 2_000_000)]
    pub max_body_bytes: usize,
}

impl Cli {
    /// Gateway configuration described by these arguments.
    pub fn to_config(&self) -> ProxyConfig {
        ProxyConfig::new()
            .with_upstream_base_url(&self.upstream_base_url)
            .with_models_path(&self.upstream_models_path)
            .with_chat_path(&self.upstream_chat_path)
            .with_api_key(self.api_key.clone())
            .with_default_system_prompt(&self.system_prompt)
            .with_default_top_k(self.top_k.as_deref().and_then(positive_int_str))
            .with_default_model(&self.default_model)
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms))
            .with_models_cache_ttl(models_cache_ttl(self.models_cache_ttl_ms.as_deref()))
            .with_max_body_bytes(self.max_body_bytes)
    }
}

/// Cache lifetime from its raw setting; unparseable or negative values
/// fall back to the default.
fn models_cache_ttl(raw: Option<&str>) -> Duration {
    let millis = raw
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .and_then(|millis| u64::try_from(millis).ok())
        .unwrap_or(DEFAULT_MODELS_CACHE_TTL_MS);
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "jimmygate",
            "--port",
            "8080",
            "--upstream-base-url",
            "http://localhost:9000/",
            "--top-k",
            "12",
        ])
        .unwrap();
        assert_eq!(cli.port, 8080);
        assert_eq!(cli.upstream_base_url, "http://localhost:9000/");
        assert_eq!(cli.top_k.as_deref(), Some("12"));
    }

    #[test]
    fn test_models_cache_ttl() {
        assert_eq!(models_cache_ttl(None), Duration::from_secs(30));
        assert_eq!(models_cache_ttl(Some("0")), Duration::ZERO);
        assert_eq!(models_cache_ttl(Some("1500")), Duration::from_millis(1500));
        assert_eq!(models_cache_ttl(Some("-5")), Duration::from_secs(30));
        assert_eq!(models_cache_ttl(Some("soon")), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_top_k_is_dropped() {
        for raw in ["0", "-3", "many", ""] {
            assert_eq!(positive_int_str(raw), None, "{raw}");
        }
        assert_eq!(positive_int_str("8"), Some(8));
    }
}
