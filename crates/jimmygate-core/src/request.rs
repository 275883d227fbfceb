//! Inbound `/v1/chat/completions` request body.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::lenient;

/// OpenAI chat completion request, decoded leniently.
///
/// Every field tolerates a wrong JSON type by treating it as absent, so
/// validation decisions stay in the handler rather than in serde errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    /// Raw messages; `None` when missing or not an array.
    #[serde(default, deserialize_with = "lenient::array")]
    pub messages: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub model: Option<String>,
    /// Only a literal `true` enables streaming.
    #[serde(default, deserialize_with = "lenient::literal_true")]
    pub stream: bool,
    #[serde(default, deserialize_with = "lenient::object")]
    pub stream_options: Option<Map<String, Value>>,
    /// Upstream-specific options passed through to `chatOptions`.
    #[serde(default, rename = "chatOptions", deserialize_with = "lenient::object")]
    pub chat_options: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub attachment: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient::array")]
    pub tools: Option<Vec<Value>>,
}

impl ChatRequest {
    /// Decode a parsed JSON body. Non-object bodies decode as an empty request.
    pub fn from_value(value: Value) -> Self {
        if value.is_object() {
            serde_json::from_value(value).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Whether `stream_options.include_usage` is truthy.
    pub fn include_usage(&self) -> bool {
        self.stream_options
            .as_ref()
            .and_then(|options| options.get("include_usage"))
            .is_some_and(lenient::is_truthy)
    }

    /// Whether the request asks for tool calling.
    pub fn has_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|tools| !tools.is_empty())
    }

    /// The requested model, or `fallback` when absent or blank.
    pub fn resolve_model(&self, fallback: &str) -> String {
        match self.model.as_deref() {
            Some(model) if !model.trim().is_empty() => model.to_string(),
            _ => fallback.to_string(),
        }
    }
}
