//! Read-through cache for the upstream model list.
//!
//! Concurrent misses join a single in-flight fetch. The fetch runs as its
//! own task, so it still populates the cache when every waiter has gone.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ProxyError;
use crate::upstream::ModelListSource;

type FetchResult = Result<Arc<Value>, ProxyError>;
type InflightFetch = Shared<BoxFuture<'static, FetchResult>>;

#[derive(Default)]
struct CacheState {
    payload: Option<Arc<Value>>,
    fetched_at: Option<Instant>,
    inflight: Option<InflightFetch>,
}

/// Model directory backed by a [`ModelListSource`], with TTL and single-flight.
#[derive(Clone)]
pub struct ModelDirectory {
    source: Arc<dyn ModelListSource>,
    ttl: Duration,
    state: Arc<Mutex<CacheState>>,
}

impl std::fmt::Debug for ModelDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDirectory")
            .field("source", &self.source)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ModelDirectory {
    /// A `ttl` of zero disables caching; every call fetches.
    pub fn new(source: Arc<dyn ModelListSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    /// The full model list payload.
    pub async fn get(&self) -> FetchResult {
        let fetch = {
            let mut state = self.state.lock().await;

            if let (Some(payload), Some(fetched_at)) = (&state.payload, state.fetched_at)
                && !self.ttl.is_zero()
                && fetched_at.elapsed() <= self.ttl
            {
                debug!("Model list served from cache");
                return Ok(Arc::clone(payload));
            }

            if let Some(inflight) = state.inflight.clone() {
                debug!("Joining in-flight model list fetch");
                inflight
            } else {
                let inflight = self.spawn_fetch();
                state.inflight = Some(inflight.clone());
                inflight
            }
        };

        fetch.await
    }

    /// One model object from the list's `data` array, matched by `id`.
    pub async fn get_by_id(&self, id: &str) -> Result<Value, ProxyError> {
        let payload = self.get().await?;
        payload
            .get("data")
            .and_then(Value::as_array)
            .and_then(|models| {
                models
                    .iter()
                    .find(|model| model.get("id").and_then(Value::as_str) == Some(id))
            })
            .cloned()
            .ok_or_else(|| ProxyError::ModelNotFound(id.to_string()))
    }

    // Called with the state lock held; the task's own lock waits until the
    // caller has recorded the in-flight handle.
    fn spawn_fetch(&self) -> InflightFetch {
        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);

        let task = tokio::spawn(async move {
            let result = source.fetch_models().await.map(Arc::new);

            let mut state = state.lock().await;
            state.inflight = None;
            match &result {
                Ok(payload) => {
                    state.payload = Some(Arc::clone(payload));
                    state.fetched_at = Some(Instant::now());
                }
                Err(e) => warn!("Model list fetch failed: {e}"),
            }
            result
        });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(ProxyError::Internal(format!("model list task failed: {e}")))
            })
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FakeSource {
        calls: AtomicUsize,
        delay: Duration,
        response: Result<Value, ProxyError>,
    }

    impl FakeSource {
        fn ok(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                response: Ok(json!({
                    "object": "list",
                    "data": [
                        {"id": "llama3.1-8B", "object": "model"},
                        {"id": "org/other", "object": "model"}
                    ]
                })),
            })
        }

        fn failing(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                response: Err(ProxyError::Upstream {
                    status: 503,
                    message: "down".into(),
                }),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelListSource for FakeSource {
        async fn fetch_models(&self) -> Result<Value, ProxyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.response.clone()
        }
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        let source = FakeSource::ok(Duration::from_millis(50));
        let directory = ModelDirectory::new(source.clone(), Duration::from_secs(30));

        let calls = (0..8).map(|_| directory.get());
        let results = futures_util::future::join_all(calls).await;

        assert_eq!(source.calls(), 1);
        for result in results {
            assert_eq!(result.unwrap()["object"], "list");
        }
    }

    #[tokio::test]
    async fn test_error_is_shared_and_not_cached() {
        let source = FakeSource::failing(Duration::from_millis(20));
        let directory = ModelDirectory::new(source.clone(), Duration::from_secs(30));

        let (a, b) = tokio::join!(directory.get(), directory.get());
        assert_eq!(source.calls(), 1);
        for result in [a, b] {
            let err = result.unwrap_err();
            assert_eq!(err.status().as_u16(), 503);
            assert_eq!(err.to_string(), "down");
        }

        let _ = directory.get().await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_fresh_entry_is_reused() {
        let source = FakeSource::ok(Duration::ZERO);
        let directory = ModelDirectory::new(source.clone(), Duration::from_secs(30));

        directory.get().await.unwrap();
        directory.get().await.unwrap();
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_refetches() {
        let source = FakeSource::ok(Duration::ZERO);
        let directory = ModelDirectory::new(source.clone(), Duration::ZERO);

        directory.get().await.unwrap();
        directory.get().await.unwrap();
        directory.get().await.unwrap();
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_expired_entry_refetches() {
        let source = FakeSource::ok(Duration::ZERO);
        let directory = ModelDirectory::new(source.clone(), Duration::from_millis(20));

        directory.get().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        directory.get().await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_fetch_still_populates_cache() {
        let source = FakeSource::ok(Duration::from_millis(30));
        let directory = ModelDirectory::new(source.clone(), Duration::from_secs(30));

        let waiter = {
            let directory = directory.clone();
            tokio::spawn(async move { directory.get().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        waiter.abort();

        tokio::time::sleep(Duration::from_millis(80)).await;
        directory.get().await.unwrap();
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let source = FakeSource::ok(Duration::ZERO);
        let directory = ModelDirectory::new(source, Duration::from_secs(30));

        let model = directory.get_by_id("org/other").await.unwrap();
        assert_eq!(model["id"], "org/other");

        let err = directory.get_by_id("missing").await.unwrap_err();
        assert!(matches!(err, ProxyError::ModelNotFound(ref id) if id == "missing"));
        assert_eq!(err.code(), Some("model_not_found"));
    }

    #[tokio::test]
    async fn test_get_by_id_without_data_array() {
        let source = Arc::new(FakeSource {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            response: Ok(json!(["llama3.1-8B"])),
        });
        let directory = ModelDirectory::new(source, Duration::from_secs(30));
        let err = directory.get_by_id("llama3.1-8B").await.unwrap_err();
        assert!(matches!(err, ProxyError::ModelNotFound(_)));
    }
}
