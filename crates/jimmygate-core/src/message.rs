//! Normalization of inbound OpenAI messages into the upstream's flat schema.
//!
//! The upstream accepts only `user` and `assistant` turns with plain-text
//! content; system prompts travel separately in `chatOptions.systemPrompt`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::MessageContent;
use crate::id::{MESSAGE_ID_PREFIX, make_id};
use crate::lenient;

/// Role of a message after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A message in the shape the upstream expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
}

/// Result of [`normalize_messages`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedRequest {
    /// All system-role texts joined by a blank line. May be empty.
    pub system_prompt: String,
    /// Non-system messages in input order, none with empty content.
    pub messages: Vec<InboundMessage>,
}

/// Loosely-typed message as it arrives from a client.
#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default, deserialize_with = "lenient::string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    role: Option<String>,
    #[serde(default)]
    content: MessageContent,
}

/// Normalize a sequence of raw message values.
///
/// Entries that are not objects, and entries whose content flattens to an
/// empty string, are skipped. `system` messages are collected into the
/// system prompt; roles other than `user`/`assistant` become `user`
/// messages tagged with `[<role>] `.
pub fn normalize_messages(raw: &[Value]) -> NormalizedRequest {
    let mut system_prompts = Vec::new();
    let mut messages = Vec::new();

    for value in raw {
        if !value.is_object() {
            continue;
        }
        let Ok(message) = serde_json::from_value::<RawMessage>(value.clone()) else {
            continue;
        };

        let content = message.content.to_text();
        if content.is_empty() {
            continue;
        }

        let role = message.role.unwrap_or_else(|| "user".to_string());
        if role == "system" {
            system_prompts.push(content);
            continue;
        }

        let id = message.id.unwrap_or_else(|| make_id(MESSAGE_ID_PREFIX));
        match role.as_str() {
            "user" => messages.push(InboundMessage {
                id,
                role: ChatRole::User,
                content,
            }),
            "assistant" => messages.push(InboundMessage {
                id,
                role: ChatRole::Assistant,
                content,
            }),
            other => messages.push(InboundMessage {
                id,
                role: ChatRole::User,
                content: format!("[{other}] {content}"),
            }),
        }
    }

    NormalizedRequest {
        system_prompt: system_prompts.join("\n\n"),
        messages,
    }
}
