use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common_observability::AccessMetrics;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::CacheBackend;
use crate::key::{CacheKey, DEFAULT_TTL};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] anyhow::Error),
    #[error("cache payload error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read-through cache for tenant-sharded listings and the tenant aggregates.
///
/// Every backend or payload failure is logged, counted and then treated as a
/// miss (reads) or a no-op (writes). Nothing in this type returns a cache
/// error to the caller.
#[derive(Clone)]
pub struct ListingCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    metrics: Option<Arc<AccessMetrics>>,
}

impl ListingCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend, ttl: DEFAULT_TTL, metrics: None }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<AccessMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// `Some` on hit, `None` on miss or on any failure.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let rendered = key.render();
        let hit = match self.try_get(&rendered).await {
            Ok(hit) => hit,
            Err(err) => {
                self.record_error("get", &rendered, &err);
                None
            }
        };
        if let Some(metrics) = &self.metrics {
            metrics.cache_lookup(hit.is_some());
        }
        if hit.is_some() {
            debug!(cache_key = %rendered, "cache_hit");
        }
        hit
    }

    pub async fn put<T: Serialize>(&self, key: &CacheKey, payload: &T) {
        let rendered = key.render();
        if let Err(err) = self.try_put(&rendered, payload).await {
            self.record_error("set", &rendered, &err);
        } else {
            debug!(cache_key = %rendered, ttl_secs = self.ttl.as_secs(), "cache_set");
        }
    }

    /// Whole-key delete. Idempotent.
    pub async fn invalidate(&self, key: &CacheKey) {
        let rendered = key.render();
        match self.backend.delete(&rendered).await {
            Ok(()) => {
                info!(cache_key = %rendered, "cache_invalidated");
                if let Some(metrics) = &self.metrics {
                    metrics.cache_invalidation(key.kind());
                }
            }
            Err(err) => self.record_error("delete", &rendered, &CacheError::Backend(err)),
        }
    }

    /// Returns the cached payload when present, otherwise runs `load`, stores
    /// its result and returns it. Errors from `load` propagate and nothing is
    /// cached for them.
    pub async fn read_through<T, E, F, Fut>(&self, key: &CacheKey, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }
        let fresh = load().await?;
        self.put(key, &fresh).await;
        Ok(fresh)
    }

    async fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.backend.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn try_put<T: Serialize>(&self, key: &str, payload: &T) -> Result<(), CacheError> {
        let raw = serde_json::to_string(payload)?;
        self.backend.set(key, raw, self.ttl).await?;
        Ok(())
    }

    fn record_error(&self, operation: &'static str, key: &str, err: &CacheError) {
        warn!(cache_key = %key, operation, error = %err, "cache_backend_error");
        if let Some(metrics) = &self.metrics {
            metrics.cache_error(operation);
        }
    }
}
