//! Non-streaming chat completion assembly.

use jimmygate_core::{decode_stats, finish_reason, usage};
use tracing::error;

use crate::error::ProxyError;
use crate::models::{ChatCompletionResponse, CompletionMeta};

/// Read the whole upstream body and build one `chat.completion` object.
pub(crate) async fn collect_completion(
    upstream: reqwest::Response,
    meta: CompletionMeta,
) -> Result<ChatCompletionResponse, ProxyError> {
    let body = upstream.bytes().await.map_err(|e| {
        error!("Failed to read upstream response: {e}");
        ProxyError::UpstreamUnavailable(e.to_string())
    })?;
    Ok(build_completion(&String::from_utf8_lossy(&body), meta))
}

/// Strip the stats block from `text` and shape the response around it.
pub fn build_completion(text: &str, meta: CompletionMeta) -> ChatCompletionResponse {
    let decoded = decode_stats(text);
    let stats = decoded.stats.as_ref();
    ChatCompletionResponse::new(meta, decoded.text, finish_reason(stats), usage(stats))
}
