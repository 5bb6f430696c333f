//! Key-value cache capability used by the wishlist reader, with a Redis
//! backend and an in-process backend.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::Mutex;

/// Bound on any single cache round trip; a slow cache counts as unavailable.
const CACHE_OP_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Unavailable(e.to_string())
    }
}

/// Get/set/delete of string values with expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

// ---------------------------------------------------------------------------
// Redis
// ---------------------------------------------------------------------------

/// Redis backend. One multiplexed connection is opened lazily and shared by
/// every operation; it is dropped after any failure and reopened on next use.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
    conn: Arc<Mutex<Option<MultiplexedConnection>>>,
}

impl RedisCache {
    /// Parses the URL only; no connection is made until first use.
    pub fn new(redis_url: &str) -> crate::error::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client, conn: Arc::new(Mutex::new(None)) })
    }

    async fn get_connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = bounded(self.client.get_multiplexed_async_connection()).await??;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn reset_connection(&self) {
        self.conn.lock().await.take();
    }

    /// Run one command on the shared connection, dropping it on failure.
    async fn with_connection<T, F, Fut>(&self, op: F) -> Result<T, CacheError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let conn = self.get_connection().await?;
        let result = match bounded(op(conn)).await {
            Ok(r) => r.map_err(CacheError::from),
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.reset_connection().await;
        }
        result
    }
}

async fn bounded<F: Future>(fut: F) -> Result<F::Output, CacheError> {
    tokio::time::timeout(CACHE_OP_TIMEOUT, fut)
        .await
        .map_err(|_| CacheError::Unavailable("operation timed out".to_string()))
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.with_connection(|mut conn| async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let secs = ttl.as_secs().max(1);
        self.with_connection(|mut conn| async move { conn.set_ex::<_, _, ()>(key, value, secs).await })
            .await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.with_connection(|mut conn| async move { conn.del::<_, ()>(key).await })
            .await
    }
}

// ---------------------------------------------------------------------------
// In-process
// ---------------------------------------------------------------------------

/// Process-local cache. An expired entry is dropped when it is read, and every
/// write sweeps all expired entries so keys that are never read again do not
/// accumulate.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, (String, Instant)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if entry.1 > Instant::now() {
                return Ok(Some(entry.0.clone()));
            }
        }
        // Re-checked under the shard lock so a concurrent fresh `set` survives.
        self.entries.remove_if(key, |_, (_, expires_at)| *expires_at <= Instant::now());
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.purge_expired();
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}
