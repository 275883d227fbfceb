//! Assembly of the upstream `/api/chat` request body.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::lenient;
use crate::message::{InboundMessage, normalize_messages};
use crate::request::ChatRequest;

/// Process-wide prompt defaults applied to every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptDefaults {
    /// Prepended to every merged system prompt when non-blank.
    pub system_prompt: String,
    /// Used when the request carries no valid `chatOptions.topK`.
    pub top_k: Option<u64>,
}

/// `chatOptions` object sent upstream.
///
/// Keys this type owns are stripped from `passthrough` before flattening,
/// so the serialized object never has duplicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOptions {
    pub selected_model: String,
    pub system_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u64>,
    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

/// Body of the upstream chat call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamPayload {
    pub messages: Vec<InboundMessage>,
    pub chat_options: ChatOptions,
    /// Serialized as `null` when the request had no attachment object.
    pub attachment: Option<Map<String, Value>>,
}

const OWNED_OPTION_KEYS: [&str; 3] = ["selectedModel", "systemPrompt", "topK"];

/// Build the upstream payload for `request` targeting `model`.
pub fn build_upstream_payload(
    request: &ChatRequest,
    model: &str,
    defaults: &PromptDefaults,
) -> UpstreamPayload {
    let normalized = request
        .messages
        .as_deref()
        .map(normalize_messages)
        .unwrap_or_default();

    let mut passthrough = request.chat_options.clone().unwrap_or_default();

    let request_prompt = passthrough.get("systemPrompt").and_then(Value::as_str);
    let system_prompt = merge_system_prompts(&[
        defaults.system_prompt.as_str(),
        request_prompt.unwrap_or_default(),
        normalized.system_prompt.as_str(),
    ]);

    let top_k = passthrough
        .get("topK")
        .and_then(lenient::positive_int)
        .or(defaults.top_k);

    for key in OWNED_OPTION_KEYS {
        passthrough.remove(key);
    }

    UpstreamPayload {
        messages: normalized.messages,
        chat_options: ChatOptions {
            selected_model: model.to_string(),
            system_prompt,
            top_k,
            passthrough,
        },
        attachment: request.attachment.clone(),
    }
}

/// Join the non-blank prompts with a blank line, in order.
pub fn merge_system_prompts(prompts: &[&str]) -> String {
    prompts
        .iter()
        .filter(|prompt| !prompt.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n\n")
}
