//! OpenAI API data models for responses produced by the gateway.
//!
//! Inbound request decoding and the protocol types live in `jimmygate-core`;
//! this module only shapes what goes back over the wire.

use jimmygate_core::{COMPLETION_ID_PREFIX, FinishReason, Usage, make_id};
use serde::Serialize;

// =============================================================================
// Completion metadata
// =============================================================================

/// Identity shared by every object emitted for one completion.
#[derive(Debug, Clone)]
pub struct CompletionMeta {
    pub id: String,
    pub created: i64,
    pub model: String,
}

impl CompletionMeta {
    /// Mint a fresh completion id stamped with the current time.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: make_id(COMPLETION_ID_PREFIX),
            created: chrono::Utc::now().timestamp(),
            model: model.into(),
        }
    }
}

// =============================================================================
// Chat Completion Response Types
// =============================================================================

/// Response from /v1/chat/completions (non-streaming).
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// A single chat completion choice.
#[derive(Debug, Clone, Serialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: FinishReason,
}

/// Assistant message inside a non-streaming choice.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatCompletionResponse {
    pub fn new(
        meta: CompletionMeta,
        content: String,
        finish_reason: FinishReason,
        usage: Option<Usage>,
    ) -> Self {
        Self {
            id: meta.id,
            object: "chat.completion",
            created: meta.created,
            model: meta.model,
            choices: vec![ChatChoice {
                index: 0,
                message: ResponseMessage {
                    role: "assistant",
                    content,
                },
                finish_reason,
            }],
            usage,
        }
    }
}

// =============================================================================
// Streaming Types
// =============================================================================

/// Streaming chunk from /v1/chat/completions.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChunkChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// A single streaming choice. `finish_reason` is serialized as `null`
/// until the final chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ChatChunkChoice {
    pub index: u32,
    pub delta: ChatDelta,
    pub finish_reason: Option<FinishReason>,
}

/// Delta content in a streaming response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    fn with_choices(meta: &CompletionMeta, choices: Vec<ChatChunkChoice>) -> Self {
        Self {
            id: meta.id.clone(),
            object: "chat.completion.chunk",
            created: meta.created,
            model: meta.model.clone(),
            choices,
            usage: None,
        }
    }

    /// Content delta. The first one of a stream also carries the role.
    pub fn content(meta: &CompletionMeta, text: String, with_role: bool) -> Self {
        let delta = ChatDelta {
            role: with_role.then_some("assistant"),
            content: Some(text),
        };
        Self::with_choices(
            meta,
            vec![ChatChunkChoice {
                index: 0,
                delta,
                finish_reason: None,
            }],
        )
    }

    /// Empty delta carrying the finish reason.
    pub fn finish(meta: &CompletionMeta, reason: FinishReason) -> Self {
        Self::with_choices(
            meta,
            vec![ChatChunkChoice {
                index: 0,
                delta: ChatDelta::default(),
                finish_reason: Some(reason),
            }],
        )
    }

    /// Trailing usage report with no choices.
    pub fn usage(meta: &CompletionMeta, usage: Option<Usage>) -> Self {
        let mut chunk = Self::with_choices(meta, Vec::new());
        chunk.usage = usage;
        chunk
    }
}

// =============================================================================
// Health Endpoint Types
// =============================================================================

/// Response from /healthz.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub upstream: String,
}

// =============================================================================
// Error Response Types
// =============================================================================

/// Error response matching OpenAI format.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail within an error response. `param` and `code` are always
/// present, as `null` when unset.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub param: Option<String>,
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(
        message: impl Into<String>,
        error_type: impl Into<String>,
        code: Option<&str>,
    ) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                r#type: error_type.into(),
                param: None,
                code: code.map(str::to_string),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> CompletionMeta {
        CompletionMeta {
            id: "chatcmpl-test".into(),
            created: 1_700_000_000,
            model: "m".into(),
        }
    }

    #[test]
    fn test_meta_id_shape() {
        let meta = CompletionMeta::new("m");
        assert!(meta.id.starts_with("chatcmpl-"));
        assert_eq!(meta.id.len(), "chatcmpl-".len() + 24);
    }

    #[test]
    fn test_first_content_chunk_has_role() {
        let json = serde_json::to_value(ChatCompletionChunk::content(&meta(), "Hi".into(), true))
            .unwrap();
        assert_eq!(
            json,
            json!({
                "id": "chatcmpl-test",
                "object": "chat.completion.chunk",
                "created": 1_700_000_000,
                "model": "m",
                "choices": [{
                    "index": 0,
                    "delta": {"role": "assistant", "content": "Hi"},
                    "finish_reason": null
                }]
            })
        );

        let later = serde_json::to_value(ChatCompletionChunk::content(&meta(), "x".into(), false))
            .unwrap();
        assert_eq!(later["choices"][0]["delta"], json!({"content": "x"}));
    }

    #[test]
    fn test_finish_chunk() {
        let json =
            serde_json::to_value(ChatCompletionChunk::finish(&meta(), FinishReason::Length))
                .unwrap();
        assert_eq!(json["choices"][0]["delta"], json!({}));
        assert_eq!(json["choices"][0]["finish_reason"], "length");
    }

    #[test]
    fn test_usage_chunk_without_usage() {
        let json = serde_json::to_value(ChatCompletionChunk::usage(&meta(), None)).unwrap();
        assert_eq!(json["choices"], json!([]));
        assert!(json.get("usage").is_none());
    }

    #[test]
    fn test_completion_response_shape() {
        let usage = Usage {
            prompt_tokens: 3,
            completion_tokens: 2,
            total_tokens: 5,
        };
        let response =
            ChatCompletionResponse::new(meta(), "Hello".into(), FinishReason::Stop, Some(usage));
        let json = serde_json::to_value(response).unwrap();
        assert_eq!(json["object"], "chat.completion");
        assert_eq!(
            json["choices"][0]["message"],
            json!({"role": "assistant", "content": "Hello"})
        );
        assert_eq!(json["choices"][0]["finish_reason"], "stop");
        assert_eq!(json["usage"]["total_tokens"], 5);
    }
}
