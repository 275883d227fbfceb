//! Message content shapes and their reduction to plain text.
//!
//! OpenAI-compatible clients send `content` as a bare string, as an array of
//! typed parts, or occasionally as a single text object. The upstream only
//! understands flat text, so every shape is decoded into [`MessageContent`]
//! and flattened by [`MessageContent::to_text`]. Unknown shapes decode into
//! the `Other` variants and flatten to an empty string.

use serde::Deserialize;
use serde_json::Value;

/// Inbound `content` field of a chat message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// `"content": "hello"`
    Text(String),
    /// `"content": [{"type": "text", "text": "hello"}, ...]`
    Parts(Vec<ContentPart>),
    /// `"content": {"text": "hello"}`
    TextObject { text: String },
    /// `"content": {"value": "hello"}`
    ValueObject { value: String },
    /// Anything else, including `null` and numbers.
    Other(Value),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Other(Value::Null)
    }
}

/// One element of an array-shaped content field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    /// A bare string element.
    Text(String),
    /// A nested array; carries no text.
    Array(Vec<Value>),
    /// `{"type": "text", "text": "..."}`
    TextField { text: String },
    /// `{"type": "text", "text": {"value": "..."}}` (Assistants-style)
    NestedText { text: TextValue },
    /// `{"type": "input_text", "input_text": "..."}`
    InputText { input_text: String },
    /// Image parts, audio parts and anything unrecognised.
    Other(Value),
}

/// Wrapper used by nested text parts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TextValue {
    pub value: String,
}

impl ContentPart {
    fn as_text(&self) -> &str {
        match self {
            Self::Text(text)
            | Self::TextField { text }
            | Self::NestedText {
                text: TextValue { value: text },
            }
            | Self::InputText { input_text: text } => text,
            Self::Array(_) | Self::Other(_) => "",
        }
    }
}

impl MessageContent {
    /// Decode an arbitrary JSON value. Never fails; unknown shapes map to `Other`.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or(Self::Other(value))
    }

    /// Flatten the content to plain text.
    ///
    /// Array parts are joined with `\n`, skipping parts that contribute no text.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) | Self::TextObject { text } | Self::ValueObject { value: text } => {
                text.clone()
            }
            Self::Parts(parts) => parts
                .iter()
                .map(ContentPart::as_text)
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Other(_) => String::new(),
        }
    }
}

/// Reduce any JSON content value to plain text.
pub fn extract_text(value: &Value) -> String {
    MessageContent::from_value(value.clone()).to_text()
}
