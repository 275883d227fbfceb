//! Upstream text stream → OpenAI SSE adapter.
//!
//! The upstream streams raw prose with a `<|stats|>…<|/stats|>` block
//! somewhere in it. This module re-frames that into
//! `chat.completion.chunk` events: content deltas as prose is confirmed,
//! then a finish chunk, an optional usage chunk and `data: [DONE]`.

use std::collections::VecDeque;

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use jimmygate_core::{StatsScanner, Utf8Decoder, finish_reason, usage};
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::{ChatCompletionChunk, CompletionMeta};

/// Literal stream terminator.
const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// Translate an upstream chat response into an SSE response.
pub(crate) fn stream_chat_response(
    upstream: reqwest::Response,
    meta: CompletionMeta,
    include_usage: bool,
) -> Response {
    let sse_stream = translate_stream(upstream.bytes_stream(), meta, include_usage);

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream; charset=utf-8")
        .header("cache-control", "no-cache, no-transform")
        .header("x-accel-buffering", "no") // Disable nginx buffering
        .body(Body::from_stream(sse_stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reading,
    Done,
}

/// State threaded through the `unfold` stream.
struct TranslatorState {
    stream: BoxStream<'static, Result<Bytes, std::io::Error>>,
    decoder: Utf8Decoder,
    scanner: StatsScanner,
    meta: CompletionMeta,
    include_usage: bool,
    role_sent: bool,
    /// Frames ready to be written, in order.
    queue: VecDeque<Result<Bytes, std::io::Error>>,
    phase: Phase,
}

impl TranslatorState {
    fn push_prose(&mut self, pieces: Vec<String>) {
        for text in pieces.into_iter().filter(|text| !text.is_empty()) {
            let chunk = ChatCompletionChunk::content(&self.meta, text, !self.role_sent);
            self.role_sent = true;
            self.queue.push_back(sse_frame(&chunk));
        }
    }

    /// Drain what is buffered and queue the closing frames.
    fn finish(&mut self) {
        let tail = self.decoder.finish();
        let pieces = self.scanner.finish(&tail);
        self.push_prose(pieces);

        let stats = self.scanner.stats();
        let finish = ChatCompletionChunk::finish(&self.meta, finish_reason(stats));
        self.queue.push_back(sse_frame(&finish));

        if self.include_usage {
            let chunk = ChatCompletionChunk::usage(&self.meta, usage(stats));
            self.queue.push_back(sse_frame(&chunk));
        }

        self.queue.push_back(Ok(Bytes::from_static(DONE_FRAME)));
        self.phase = Phase::Done;
        debug!(id = %self.meta.id, "Upstream stream complete");
    }
}

/// Convert an upstream byte stream into SSE frames.
///
/// A read error after streaming has begun ends the stream with that error;
/// the HTTP layer then drops the connection.
pub(crate) fn translate_stream<S, E>(
    byte_stream: S,
    meta: CompletionMeta,
    include_usage: bool,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = TranslatorState {
        stream: byte_stream.map(|r| r.map_err(std::io::Error::other)).boxed(),
        decoder: Utf8Decoder::new(),
        scanner: StatsScanner::new(),
        meta,
        include_usage,
        role_sent: false,
        queue: VecDeque::new(),
        phase: Phase::Reading,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(frame) = st.queue.pop_front() {
                return Some((frame, st));
            }
            if st.phase == Phase::Done {
                return None;
            }

            match st.stream.next().await {
                Some(Ok(chunk)) => {
                    let text = st.decoder.decode(&chunk);
                    let pieces = st.scanner.feed(&text);
                    st.push_prose(pieces);
                }
                Some(Err(e)) => {
                    warn!("Upstream stream error: {e}");
                    st.phase = Phase::Done;
                    return Some((Err(e), st));
                }
                None => st.finish(),
            }
        }
    })
}

/// Serialize one chunk as a `data: <json>\n\n` frame.
fn sse_frame<T: Serialize>(chunk: &T) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_string(chunk).map_err(std::io::Error::other)?;
    Ok(Bytes::from(format!("data: {json}\n\n")))
}
