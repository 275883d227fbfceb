//! Protocol adapter between OpenAI chat-completions payloads and an upstream
//! chat service that streams raw text with an embedded stats block.
//!
//! Everything here is pure: no sockets, no clocks beyond id minting. The
//! HTTP side lives in `jimmygate-proxy`.
#![deny(unsafe_code)]

pub mod content;
pub mod id;
pub mod lenient;
pub mod message;
pub mod payload;
pub mod request;
pub mod stats;
pub mod utf8;

pub use content::{ContentPart, MessageContent, extract_text};
pub use id::{COMPLETION_ID_PREFIX, MESSAGE_ID_PREFIX, make_id};
pub use message::{ChatRole, InboundMessage, NormalizedRequest, normalize_messages};
pub use payload::{ChatOptions, PromptDefaults, UpstreamPayload, build_upstream_payload};
pub use request::ChatRequest;
pub use stats::{
    DecodedText, FinishReason, MARKER_LOOKBEHIND, STATS_END, STATS_START, ScanOutcome, ScanStep,
    StatsBlock, StatsScanner, Usage, decode_stats, finish_reason, usage,
};
pub use utf8::Utf8Decoder;
