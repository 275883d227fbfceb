//! Gateway error type and its OpenAI error-envelope rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;

use crate::models::ErrorResponse;

/// Every way a gateway request can fail.
///
/// `Clone` so one upstream failure can be handed to every caller joined on
/// a shared model-list fetch.
#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    /// Malformed or unsupported request.
    #[error("{0}")]
    BadRequest(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Unknown route: {0}")]
    RouteNotFound(String),

    #[error("Model '{0}' not found")]
    ModelNotFound(String),

    #[error("Invalid API key")]
    Unauthorized,

    /// Upstream answered with a non-success status.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    /// Upstream could not be reached, or its body could not be read.
    #[error("Failed to reach upstream: {0}")]
    UpstreamUnavailable(String),

    /// Upstream answered 2xx with a body that is not the expected JSON.
    #[error("{0}")]
    UpstreamMalformed(String),

    #[error("Upstream request timed out")]
    Timeout,

    #[error("Internal proxy error")]
    Internal(String),
}

impl ProxyError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RouteNotFound(_) | Self::ModelNotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::UpstreamUnavailable(_) | Self::UpstreamMalformed(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// OpenAI `error.type`.
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::BadRequest(_)
            | Self::MethodNotAllowed
            | Self::PayloadTooLarge(_)
            | Self::RouteNotFound(_)
            | Self::ModelNotFound(_) => "invalid_request_error",
            Self::Unauthorized => "authentication_error",
            Self::Upstream { .. }
            | Self::UpstreamUnavailable(_)
            | Self::UpstreamMalformed(_)
            | Self::Timeout
            | Self::Internal(_) => "api_error",
        }
    }

    /// OpenAI `error.code`, when the variant has one.
    pub const fn code(&self) -> Option<&'static str> {
        match self {
            Self::RouteNotFound(_) => Some("not_found"),
            Self::ModelNotFound(_) => Some("model_not_found"),
            Self::Unauthorized => Some("invalid_api_key"),
            Self::UpstreamUnavailable(_) => Some("upstream_error"),
            Self::Timeout => Some("upstream_timeout"),
            Self::Internal(_) => Some("internal_error"),
            _ => None,
        }
    }

    /// Build an [`ProxyError::Upstream`] from a failed upstream response body.
    pub fn from_upstream_body(status: u16, raw: &str) -> Self {
        Self::Upstream {
            status,
            message: upstream_error_message(status, raw),
        }
    }

    pub fn to_response_body(&self) -> ErrorResponse {
        ErrorResponse::new(self.to_string(), self.error_type(), self.code())
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::UpstreamUnavailable(err.to_string())
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            tracing::error!("Unhandled proxy error: {detail}");
        }
        (self.status(), axum::Json(self.to_response_body())).into_response()
    }
}

/// Best human-readable message from an upstream error body.
///
/// Tries JSON `error` (a string, or an object with `message`), then JSON
/// `message`, then the raw text, then a generic status line.
pub fn upstream_error_message(status: u16, raw: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        let from_error = match parsed.get("error") {
            Some(Value::String(message)) => Some(message.as_str()),
            Some(Value::Object(object)) => object.get("message").and_then(Value::as_str),
            _ => None,
        };
        let found = from_error
            .or_else(|| parsed.get("message").and_then(Value::as_str))
            .filter(|message| !message.is_empty());
        if let Some(message) = found {
            return message.to_string();
        }
    }

    if raw.is_empty() {
        format!("Upstream returned {status}")
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ProxyError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ProxyError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ProxyError::Timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ProxyError::ModelNotFound("m".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ProxyError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_status_passthrough() {
        let err = ProxyError::Upstream {
            status: 429,
            message: "slow down".into(),
        };
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);

        let weird = ProxyError::Upstream {
            status: 302,
            message: "moved".into(),
        };
        assert_eq!(weird.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_envelope_fields() {
        let body = ProxyError::Timeout.to_response_body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "error": {
                    "message": "Upstream request timed out",
                    "type": "api_error",
                    "param": null,
                    "code": "upstream_timeout"
                }
            })
        );

        let json = serde_json::to_value(ProxyError::BadRequest("nope".into()).to_response_body())
            .unwrap();
        assert_eq!(json["error"]["type"], "invalid_request_error");
        assert_eq!(json["error"]["code"], Value::Null);
    }

    #[test]
    fn test_internal_hides_detail() {
        let err = ProxyError::Internal("secret stack trace".into());
        assert_eq!(err.to_string(), "Internal proxy error");
        assert_eq!(err.code(), Some("internal_error"));
    }

    #[test]
    fn test_upstream_error_message() {
        assert_eq!(upstream_error_message(500, r#"{"error":"bad"}"#), "bad");
        assert_eq!(
            upstream_error_message(500, r#"{"error":{"message":"nested"}}"#),
            "nested"
        );
        assert_eq!(upstream_error_message(500, r#"{"message":"msg"}"#), "msg");
        assert_eq!(upstream_error_message(503, "plain text"), "plain text");
        assert_eq!(upstream_error_message(503, ""), "Upstream returned 503");
        assert_eq!(upstream_error_message(400, r#"{"other":1}"#), r#"{"other":1}"#);
    }
}
