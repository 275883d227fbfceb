//! Axum HTTP server for the OpenAI-compatible gateway.
//!
//! [`create_router`] builds the full route table with its middleware stack;
//! [`serve`] runs it on a pre-bound listener until cancelled.

use std::any::Any;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State, rejection::PathRejection},
    http::Uri,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::auth::require_bearer;
use crate::chat::{chat_completions, method_not_allowed};
use crate::config::ProxyConfig;
use crate::cors::permissive_cors;
use crate::error::ProxyError;
use crate::models::HealthResponse;
use crate::models_cache::ModelDirectory;
use crate::upstream::UpstreamClient;

/// Shared gateway state, injected via Axum `State`.
#[derive(Debug, Clone)]
pub struct ProxyState {
    pub(crate) config: Arc<ProxyConfig>,
    pub(crate) upstream: UpstreamClient,
    pub(crate) models: ModelDirectory,
}

impl ProxyState {
    pub fn new(config: ProxyConfig) -> Self {
        let upstream = UpstreamClient::new(&config);
        let models = ModelDirectory::new(Arc::new(upstream.clone()), config.models_cache_ttl);
        Self {
            config: Arc::new(config),
            upstream,
            models,
        }
    }
}

/// Build the router with CORS, tracing, panic recovery and the body limit.
pub fn create_router(state: ProxyState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    let v1_routes = Router::new()
        .route("/v1/models", get(list_models).fallback(unknown_route))
        .route("/v1/models/", get(missing_model_id).fallback(unknown_route))
        .route("/v1/models/{*model_id}", get(get_model).fallback(unknown_route))
        .route(
            "/v1/chat/completions",
            post(chat_completions).fallback(method_not_allowed),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/healthz", get(health_check).fallback(unknown_route))
        .merge(v1_routes)
        .fallback(unknown_route)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(permissive_cors))
        .with_state(state)
}

/// Start the gateway with a pre-bound listener.
///
/// Runs until `cancel` fires, then drains in-flight connections.
pub async fn serve(
    listener: TcpListener,
    config: ProxyConfig,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(
        upstream = %config.upstream_base_url(),
        auth_enabled = config.auth_enabled(),
        "Gateway starting on {addr}"
    );

    let app = create_router(ProxyState::new(config));

    info!("Gateway listening on http://{addr}/v1");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("Gateway shut down");
    Ok(())
}

/// Health check endpoint.
async fn health_check(State(state): State<ProxyState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        upstream: state.config.upstream_base_url().to_string(),
    })
}

/// Upstream model list, served through the cache.
async fn list_models(State(state): State<ProxyState>) -> Result<Json<Value>, ProxyError> {
    debug!("GET /v1/models");
    let payload = state.models.get().await?;
    Ok(Json(Value::clone(&payload)))
}

/// A single model from the cached list.
async fn get_model(
    State(state): State<ProxyState>,
    model_id: Result<Path<String>, PathRejection>,
) -> Result<Json<Value>, ProxyError> {
    let Path(model_id) = model_id.map_err(|e| ProxyError::BadRequest(e.body_text()))?;
    debug!(model_id = %model_id, "GET /v1/models/{{id}}");
    if model_id.is_empty() {
        return Err(missing_model_id().await);
    }
    Ok(Json(state.models.get_by_id(&model_id).await?))
}

async fn missing_model_id() -> ProxyError {
    ProxyError::BadRequest("Model id is required".to_string())
}

async fn unknown_route(uri: Uri) -> ProxyError {
    ProxyError::RouteNotFound(uri.path().to_string())
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    ProxyError::Internal(detail.to_string()).into_response()
}
