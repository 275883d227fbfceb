//! `/v1/chat/completions` handler.

use axum::{
    Json,
    extract::{State, rejection::BytesRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use jimmygate_core::{ChatRequest, build_upstream_payload};
use serde_json::Value;
use tracing::{debug, info};

use crate::completion::collect_completion;
use crate::error::ProxyError;
use crate::models::CompletionMeta;
use crate::server::ProxyState;
use crate::stream::stream_chat_response;

const TOOLS_UNSUPPORTED: &str =
    "This proxy does not support tool calling yet. Remove `tools` and retry.";

/// Validate, translate and forward one chat completion.
///
/// Every validation failure is reported before the upstream is contacted.
pub(crate) async fn chat_completions(
    State(state): State<ProxyState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ProxyError> {
    debug!("POST /v1/chat/completions");

    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ProxyError::PayloadTooLarge(state.config.max_body_bytes)
        } else {
            ProxyError::BadRequest(rejection.body_text())
        }
    })?;
    let request = ChatRequest::from_value(parse_json_body(&body)?);

    if request.messages.as_ref().is_none_or(Vec::is_empty) {
        return Err(ProxyError::BadRequest(
            "`messages` must be a non-empty array".to_string(),
        ));
    }
    if request.has_tools() {
        return Err(ProxyError::BadRequest(TOOLS_UNSUPPORTED.to_string()));
    }

    let model = request.resolve_model(&state.config.default_model);
    let payload = build_upstream_payload(&request, &model, &state.config.prompt_defaults);
    if payload.messages.is_empty() {
        return Err(ProxyError::BadRequest(
            "No usable non-system messages found in request".to_string(),
        ));
    }

    info!(
        model = %model,
        streaming = request.stream,
        messages = payload.messages.len(),
        "Processing chat completion request"
    );

    let upstream = state.upstream.send_chat(&payload).await?;
    let meta = CompletionMeta::new(model);

    if request.stream {
        Ok(stream_chat_response(upstream, meta, request.include_usage()))
    } else {
        let completion = collect_completion(upstream, meta).await?;
        Ok(Json(completion).into_response())
    }
}

/// Any method other than POST on the chat route.
pub(crate) async fn method_not_allowed() -> ProxyError {
    ProxyError::MethodNotAllowed
}

/// Parse a request body; a blank body reads as `{}`.
fn parse_json_body(body: &[u8]) -> Result<Value, ProxyError> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(text)
        .map_err(|_| ProxyError::BadRequest("Request body must be valid JSON".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_body_is_empty_object() {
        assert_eq!(parse_json_body(b"").unwrap(), json!({}));
        assert_eq!(parse_json_body(b"  \n ").unwrap(), json!({}));
    }

    #[test]
    fn test_invalid_json_is_bad_request() {
        let err = parse_json_body(b"{nope").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Request body must be valid JSON");
    }

    #[test]
    fn test_valid_json() {
        let value = parse_json_body(br#" {"messages": []} "#).unwrap();
        assert_eq!(value, json!({"messages": []}));
    }
}
