use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{wishlist_user_key, WISHLIST_ALL_KEY, WISHLIST_CACHE_TTL_SECS};
use crate::error::Result;
use crate::types::WishlistCriterion;
use crate::wishlist::cache::CacheBackend;

/// Authoritative source of wishlist criteria.
#[async_trait]
pub trait WishlistStore: Send + Sync {
    async fn all_criteria(&self) -> Result<Vec<WishlistCriterion>>;

    async fn criteria_for_user(&self, telegram_id: i64) -> Result<Vec<WishlistCriterion>>;
}

/// Read-through cache over a [`WishlistStore`].
///
/// Cache failures never reach callers: a miss, an undecodable entry and an
/// unreachable backend all fall through to the store. Only store errors are
/// returned.
pub struct WishlistReader {
    cache: Arc<dyn CacheBackend>,
    store: Arc<dyn WishlistStore>,
    ttl: Duration,
}

impl WishlistReader {
    pub fn new(cache: Arc<dyn CacheBackend>, store: Arc<dyn WishlistStore>) -> Self {
        Self::with_ttl(cache, store, Duration::from_secs(WISHLIST_CACHE_TTL_SECS))
    }

    pub fn with_ttl(cache: Arc<dyn CacheBackend>, store: Arc<dyn WishlistStore>, ttl: Duration) -> Self {
        Self { cache, store, ttl }
    }

    pub async fn get_all(&self) -> Result<Vec<WishlistCriterion>> {
        self.read_through(WISHLIST_ALL_KEY, || self.store.all_criteria()).await
    }

    pub async fn get_for_user(&self, telegram_id: i64) -> Result<Vec<WishlistCriterion>> {
        let key = wishlist_user_key(telegram_id);
        self.read_through(&key, || self.store.criteria_for_user(telegram_id)).await
    }

    /// Drop the user's entry and the global entry, which also contains the
    /// user's criteria. Call after any write to that user's wishlist.
    pub async fn invalidate(&self, telegram_id: i64) {
        self.delete_key(&wishlist_user_key(telegram_id)).await;
        self.delete_key(WISHLIST_ALL_KEY).await;
    }

    pub async fn invalidate_all(&self) {
        self.delete_key(WISHLIST_ALL_KEY).await;
    }

    async fn read_through<F, Fut>(&self, key: &str, load: F) -> Result<Vec<WishlistCriterion>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<WishlistCriterion>>>,
    {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<WishlistCriterion>>(&raw) {
                Ok(criteria) => {
                    debug!(key, count = criteria.len(), "wishlist cache hit");
                    return Ok(criteria);
                }
                Err(e) => warn!(key, "wishlist cache entry undecodable, reloading: {e}"),
            },
            Ok(None) => debug!(key, "wishlist cache miss"),
            Err(e) => warn!(key, "wishlist cache read failed, using store: {e}"),
        }

        let criteria = load().await?;

        match serde_json::to_string(&criteria) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(key, &raw, self.ttl).await {
                    warn!(key, "wishlist cache write failed: {e}");
                }
            }
            Err(e) => warn!(key, "wishlist encode failed: {e}"),
        }

        Ok(criteria)
    }

    async fn delete_key(&self, key: &str) {
        if let Err(e) = self.cache.delete(key).await {
            warn!(key, "wishlist cache invalidation failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::wishlist::cache::{CacheError, MemoryCache};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        rows: Mutex<Vec<WishlistCriterion>>,
        loads: AtomicUsize,
        fail: bool,
    }

    impl FakeStore {
        fn add(&self, id: i64, telegram_id: i64, name: &str) {
            self.rows.lock().unwrap().push(WishlistCriterion {
                id,
                telegram_id,
                product_name: name.to_string(),
                target_price: Some(100.0),
                discount_percentage: None,
                created_at: Utc::now(),
            });
        }

        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WishlistStore for FakeStore {
        async fn all_criteria(&self) -> Result<Vec<WishlistCriterion>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::Database(sqlx::Error::PoolClosed));
            }
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn criteria_for_user(&self, telegram_id: i64) -> Result<Vec<WishlistCriterion>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.telegram_id == telegram_id)
                .cloned()
                .collect())
        }
    }

    struct DownCache;

    #[async_trait]
    impl CacheBackend for DownCache {
        async fn get(&self, _key: &str) -> std::result::Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> std::result::Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn delete(&self, _key: &str) -> std::result::Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
    }

    fn reader(cache: Arc<dyn CacheBackend>, store: Arc<FakeStore>) -> WishlistReader {
        WishlistReader::new(cache, store)
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let store = Arc::new(FakeStore::default());
        store.add(1, 10, "kindle");
        let r = reader(Arc::new(MemoryCache::new()), store.clone());

        assert_eq!(r.get_all().await.unwrap().len(), 1);
        assert_eq!(r.get_all().await.unwrap().len(), 1);
        assert_eq!(store.loads(), 1);
    }

    #[tokio::test]
    async fn invalidate_exposes_latest_write() {
        let store = Arc::new(FakeStore::default());
        store.add(1, 10, "kindle");
        let r = reader(Arc::new(MemoryCache::new()), store.clone());

        assert_eq!(r.get_for_user(10).await.unwrap().len(), 1);
        assert_eq!(r.get_all().await.unwrap().len(), 1);

        store.add(2, 10, "echo dot");
        // Still cached until invalidated.
        assert_eq!(r.get_for_user(10).await.unwrap().len(), 1);

        r.invalidate(10).await;
        assert_eq!(r.get_for_user(10).await.unwrap().len(), 2);
        assert_eq!(r.get_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalidate_all_only_drops_global_entry() {
        let store = Arc::new(FakeStore::default());
        store.add(1, 10, "kindle");
        let r = reader(Arc::new(MemoryCache::new()), store.clone());
        r.get_all().await.unwrap();
        r.get_for_user(10).await.unwrap();

        store.add(2, 11, "echo dot");
        r.invalidate_all().await;
        assert_eq!(r.get_all().await.unwrap().len(), 2);
        assert_eq!(store.loads(), 3);
    }

    #[tokio::test]
    async fn per_user_reads_are_isolated() {
        let store = Arc::new(FakeStore::default());
        store.add(1, 10, "kindle");
        store.add(2, 11, "echo dot");
        let r = reader(Arc::new(MemoryCache::new()), store);

        let mine = r.get_for_user(11).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].product_name, "echo dot");
    }

    #[tokio::test]
    async fn undecodable_entry_falls_through_and_repopulates() {
        let store = Arc::new(FakeStore::default());
        store.add(1, 10, "kindle");
        let cache = Arc::new(MemoryCache::new());
        cache.set(WISHLIST_ALL_KEY, "not json", Duration::from_secs(60)).await.unwrap();
        let r = reader(cache.clone(), store.clone());

        assert_eq!(r.get_all().await.unwrap().len(), 1);
        let raw = cache.get(WISHLIST_ALL_KEY).await.unwrap().unwrap();
        assert!(raw.starts_with('['));
    }

    #[tokio::test]
    async fn unavailable_cache_degrades_to_store() {
        let store = Arc::new(FakeStore::default());
        store.add(1, 10, "kindle");
        let r = reader(Arc::new(DownCache), store.clone());

        assert_eq!(r.get_all().await.unwrap().len(), 1);
        assert_eq!(r.get_for_user(10).await.unwrap().len(), 1);
        r.invalidate(10).await;
        r.invalidate_all().await;
        assert_eq!(store.loads(), 2);
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        let store = Arc::new(FakeStore { fail: true, ..Default::default() });
        let r = reader(Arc::new(MemoryCache::new()), store);
        assert!(r.get_all().await.is_err());
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let store = Arc::new(FakeStore::default());
        store.add(1, 10, "kindle");
        let r = WishlistReader::with_ttl(Arc::new(MemoryCache::new()), store.clone(), Duration::from_millis(10));

        r.get_all().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        r.get_all().await.unwrap();
        assert_eq!(store.loads(), 2);
    }
}
