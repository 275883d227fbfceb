//! The `<|stats|>…<|/stats|>` sentinel block embedded in upstream output.
//!
//! The upstream appends a JSON statistics object to its prose, delimited by
//! two textual markers. [`decode_stats`] strips it from a complete body;
//! [`StatsScanner`] does the same over a stream whose chunk boundaries may
//! fall anywhere, including inside a marker.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

pub const STATS_START: &str = "<|stats|>";
pub const STATS_END: &str = "<|/stats|>";

/// Bytes held back while no start marker is pending, so that a marker split
/// across two reads is still recognised.
pub const MARKER_LOOKBEHIND: usize = STATS_START.len() - 1;

/// Parsed statistics block. Opaque JSON; only a few fields are interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsBlock(Value);

impl StatsBlock {
    /// Parse the raw text between the markers. `None` on invalid JSON or `null`.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Null) => None,
            Ok(value) => Some(Self(value)),
            Err(e) => {
                debug!("Discarding unparseable stats block: {e}");
                None
            }
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Map `done_reason` (then `reason`) to an OpenAI finish reason.
    pub fn finish_reason(&self) -> FinishReason {
        let reason = ["done_reason", "reason"]
            .iter()
            .filter_map(|key| self.0.get(key).and_then(Value::as_str))
            .find(|reason| !reason.is_empty())
            .unwrap_or("stop");
        FinishReason::from_upstream(reason)
    }

    /// Token usage, only when all three counts are present and numeric.
    ///
    /// Counts must be whole non-negative numbers; a negative or fractional
    /// count drops usage entirely.
    pub fn usage(&self) -> Option<Usage> {
        Some(Usage {
            prompt_tokens: self.count("prefill_tokens")?,
            completion_tokens: self.count("decode_tokens")?,
            total_tokens: self.count("total_tokens")?,
        })
    }

    fn count(&self, key: &str) -> Option<u64> {
        let Some(Value::Number(number)) = self.0.get(key) else {
            return None;
        };
        if let Some(count) = number.as_u64() {
            return Some(count);
        }
        let float = number.as_f64()?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = float as u64;
        (float >= 0.0 && float.fract() == 0.0).then_some(count)
    }
}

/// OpenAI `finish_reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
}

impl FinishReason {
    /// Classify a free-form upstream reason, case-insensitively.
    pub fn from_upstream(reason: &str) -> Self {
        let reason = reason.to_lowercase();
        if reason.contains("length") || reason.contains("max") {
            Self::Length
        } else if reason.contains("content_filter") {
            Self::ContentFilter
        } else {
            Self::Stop
        }
    }
}

/// OpenAI `usage` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Finish reason for an optional stats block; `stop` when there is none.
pub fn finish_reason(stats: Option<&StatsBlock>) -> FinishReason {
    stats.map_or(FinishReason::Stop, StatsBlock::finish_reason)
}

/// Usage for an optional stats block.
pub fn usage(stats: Option<&StatsBlock>) -> Option<Usage> {
    stats.and_then(StatsBlock::usage)
}

/// A complete body with its stats block removed.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedText {
    pub text: String,
    pub stats: Option<StatsBlock>,
}

/// Strip the stats block from a complete body.
///
/// Only the last occurrence of each marker counts, so marker text quoted
/// earlier in the prose is left alone. Without a well-ordered pair the input
/// comes back unchanged. Invalid JSON still has its span removed.
pub fn decode_stats(text: &str) -> DecodedText {
    let (Some(start), Some(end)) = (text.rfind(STATS_START), text.rfind(STATS_END)) else {
        return unchanged(text);
    };
    let body_start = start + STATS_START.len();
    if end < body_start {
        return unchanged(text);
    }

    let mut stripped = String::with_capacity(text.len());
    stripped.push_str(&text[..start]);
    stripped.push_str(&text[end + STATS_END.len()..]);

    DecodedText {
        text: stripped,
        stats: StatsBlock::parse(&text[body_start..end]),
    }
}

fn unchanged(text: &str) -> DecodedText {
    DecodedText {
        text: text.to_string(),
        stats: None,
    }
}

/// What a single [`StatsScanner::scan`] step found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// No start marker in the buffer.
    None,
    /// A start marker is pending without its end marker yet.
    NeedMore,
    /// A complete block was removed; scan again for more.
    Consumed,
}

/// Result of one scan step: prose confirmed ahead of a start marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanStep {
    pub prose: String,
    pub outcome: ScanOutcome,
}

/// Incremental stats decoder over a growing text buffer.
#[derive(Debug, Default)]
pub struct StatsScanner {
    pending: String,
    stats: Option<StatsBlock>,
}

impl StatsScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly decoded text.
    pub fn push(&mut self, text: &str) {
        self.pending.push_str(text);
    }

    /// Run one decode step over the pending buffer.
    pub fn scan(&mut self) -> ScanStep {
        let Some(start) = self.pending.find(STATS_START) else {
            return ScanStep {
                prose: String::new(),
                outcome: ScanOutcome::None,
            };
        };

        let prose: String = self.pending.drain(..start).collect();
        let Some(end) = self.pending[STATS_START.len()..].find(STATS_END) else {
            return ScanStep {
                prose,
                outcome: ScanOutcome::NeedMore,
            };
        };

        let end = STATS_START.len() + end;
        if let Some(stats) = StatsBlock::parse(&self.pending[STATS_START.len()..end]) {
            self.stats = Some(stats);
        }
        self.pending.drain(..end + STATS_END.len());

        ScanStep {
            prose,
            outcome: ScanOutcome::Consumed,
        }
    }

    /// Push `text` and return the prose that is safe to emit.
    ///
    /// Resolves every complete block, then, when no start marker is pending,
    /// releases all but the trailing [`MARKER_LOOKBEHIND`] bytes.
    pub fn feed(&mut self, text: &str) -> Vec<String> {
        self.push(text);
        let mut prose = self.drain_blocks();

        if self.pending.len() > MARKER_LOOKBEHIND && !self.pending.contains(STATS_START) {
            let mut split = self.pending.len() - MARKER_LOOKBEHIND;
            while !self.pending.is_char_boundary(split) {
                split -= 1;
            }
            let safe: String = self.pending.drain(..split).collect();
            if !safe.is_empty() {
                prose.push(safe);
            }
        }
        prose
    }

    /// Resolve what remains at end of stream and release everything left.
    pub fn finish(&mut self, text: &str) -> Vec<String> {
        self.push(text);
        let mut prose = self.drain_blocks();
        if !self.pending.is_empty() {
            prose.push(std::mem::take(&mut self.pending));
        }
        prose
    }

    /// The last successfully parsed stats block.
    pub fn stats(&self) -> Option<&StatsBlock> {
        self.stats.as_ref()
    }

    /// Text not yet released.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    fn drain_blocks(&mut self) -> Vec<String> {
        let mut prose = Vec::new();
        loop {
            let step = self.scan();
            if !step.prose.is_empty() {
                prose.push(step.prose);
            }
            if step.outcome != ScanOutcome::Consumed {
                return prose;
            }
        }
    }
}
