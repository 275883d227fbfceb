//! Shared helpers: a fake upstream chat service and request/response utilities.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use jimmygate_proxy::{ProxyConfig, ProxyState, create_router};

pub const STATS_BODY: &str = "Hello there<|stats|>{\"done_reason\":\"stop\",\"prefill_tokens\":3,\"decode_tokens\":2,\"total_tokens\":5}<|/stats|>";

/// Scripted upstream. Records what it receives.
#[derive(Debug)]
pub struct FakeUpstream {
    pub chat_status: StatusCode,
    pub chat_body: String,
    pub chat_delay: Duration,
    pub chat_hits: AtomicUsize,
    pub models_hits: AtomicUsize,
    pub last_payload: Mutex<Option<Value>>,
}

impl Default for FakeUpstream {
    fn default() -> Self {
        Self {
            chat_status: StatusCode::OK,
            chat_body: STATS_BODY.to_string(),
            chat_delay: Duration::ZERO,
            chat_hits: AtomicUsize::new(0),
            models_hits: AtomicUsize::new(0),
            last_payload: Mutex::new(None),
        }
    }
}

impl FakeUpstream {
    pub fn chat_hits(&self) -> usize {
        self.chat_hits.load(Ordering::SeqCst)
    }

    pub fn models_hits(&self) -> usize {
        self.models_hits.load(Ordering::SeqCst)
    }

    pub fn last_payload(&self) -> Option<Value> {
        self.last_payload.lock().unwrap().clone()
    }
}

async fn fake_models(State(fake): State<Arc<FakeUpstream>>) -> Json<Value> {
    fake.models_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "object": "list",
        "data": [
            {"id": "llama3.1-8B", "object": "model", "owned_by": "upstream"},
            {"id": "org/model-x", "object": "model", "owned_by": "upstream"}
        ]
    }))
}

async fn fake_chat(
    State(fake): State<Arc<FakeUpstream>>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    fake.chat_hits.fetch_add(1, Ordering::SeqCst);
    *fake.last_payload.lock().unwrap() = Some(payload);
    tokio::time::sleep(fake.chat_delay).await;
    (fake.chat_status, fake.chat_body.clone())
}

/// Serve `fake` on an ephemeral loopback port and return its base URL.
pub async fn spawn_upstream(fake: Arc<FakeUpstream>) -> String {
    let app = Router::new()
        .route("/api/models", get(fake_models))
        .route("/api/chat", post(fake_chat))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake upstream");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Gateway router pointed at a freshly spawned fake upstream.
pub async fn gateway(fake: FakeUpstream) -> (Router, Arc<FakeUpstream>) {
    gateway_with(fake, |config| config).await
}

/// Like [`gateway`], with extra configuration applied on top.
pub async fn gateway_with(
    fake: FakeUpstream,
    configure: impl FnOnce(ProxyConfig) -> ProxyConfig,
) -> (Router, Arc<FakeUpstream>) {
    let fake = Arc::new(fake);
    let base_url = spawn_upstream(Arc::clone(&fake)).await;
    let config = configure(ProxyConfig::new().with_upstream_base_url(base_url));
    (create_router(ProxyState::new(config)), fake)
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}
