//! Static bearer-token gate for the `/v1` routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ProxyError;
use crate::server::ProxyState;

/// Auth middleware: require `Authorization: Bearer <key>` when a key is set.
///
/// The scheme is matched case-insensitively; the token must match exactly.
pub(crate) async fn require_bearer(
    State(state): State<ProxyState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.api_key.as_deref() else {
        return next.run(req).await;
    };

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token);

    if token == Some(expected) {
        next.run(req).await
    } else {
        tracing::warn!(
            path = %req.uri().path(),
            "Unauthorized API request - missing or invalid token"
        );
        ProxyError::Unauthorized.into_response()
    }
}

/// Token from a `Bearer <token>` header value.
fn bearer_token(value: &str) -> Option<&str> {
    let value = value.trim();
    let scheme = value.get(..6)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let rest = &value[6..];
    let token = rest.trim_start();
    (token.len() < rest.len() && !token.is_empty()).then_some(token)
}
