use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Key/value store behind the listing cache. Keys arrive already rendered;
/// values are opaque serialized payloads.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

// ---------------- Redis Implementation ----------------

#[derive(Clone)]
pub struct RedisCacheBackend {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisCacheBackend {
    pub async fn connect(redis_url: &str, prefix: String) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;
        let manager = ConnectionManager::new(client)
            .await
            .context("Failed to create Redis connection manager")?;
        Ok(Self { manager, prefix })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(self.namespaced(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut conn = self.manager.clone();
        // EX 0 is rejected by Redis
        let seconds = ttl.as_secs().max(1);
        redis::cmd("SET")
            .arg(self.namespaced(key))
            .arg(value)
            .arg("EX")
            .arg(seconds)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(self.namespaced(key)).await?;
        Ok(())
    }
}

// ---------------- In-Memory Implementation ----------------

#[derive(Clone, Default)]
pub struct InMemoryCacheBackend {
    inner: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live (unexpired) keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let guard = self.inner.lock().await;
        let now = Instant::now();
        let mut keys: Vec<String> = guard
            .iter()
            .filter(|(_, (_, expires_at))| *expires_at > now)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut guard = self.inner.lock().await;
        match guard.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                guard.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let backend = InMemoryCacheBackend::new();
        backend
            .set("product_list:acme", "[]".into(), Duration::from_secs(60))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(backend.get("product_list:acme").await.unwrap().as_deref(), Some("[]"));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(backend.get("product_list:acme").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_of_absent_key_succeeds() {
        let backend = InMemoryCacheBackend::new();
        backend.delete("order_list:nobody").await.unwrap();
        assert!(backend.keys().await.is_empty());
    }
}
