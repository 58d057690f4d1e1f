//! Cache backends: process-local (DashMap) and Redis.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use tokio::time::Instant;

use storefront_storage::{CacheError, CacheStore};

/// A locally cached entry with TTL support.
///
/// Uses the tokio clock so expiry follows paused time in tests.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<str>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    pub fn new(data: String, ttl: Duration) -> Self {
        Self {
            data: Arc::from(data),
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// An entry is live up to and including its TTL, and expired strictly after.
    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Cache backend selected at startup.
///
/// ## Cache Modes
///
/// - **Local**: single-process DashMap, used when Redis is disabled or
///   unreachable at startup
/// - **Redis**: `GET` / `SET EX` against a shared Redis through a connection pool
///
/// Both modes honour the same expiry contract: an entry is never returned
/// after its TTL has elapsed.
#[derive(Clone)]
pub enum CacheBackend {
    Local(Arc<DashMap<String, CachedEntry>>),
    Redis(Pool),
}

impl CacheBackend {
    /// Create a new local-only cache backend.
    pub fn new_local() -> Self {
        CacheBackend::Local(Arc::new(DashMap::new()))
    }

    /// Create a new Redis-backed cache backend.
    pub fn new_redis(redis_pool: Pool) -> Self {
        CacheBackend::Redis(redis_pool)
    }

    /// The Redis pool, if this backend is Redis-backed.
    pub fn redis_pool(&self) -> Option<&Pool> {
        match self {
            CacheBackend::Local(_) => None,
            CacheBackend::Redis(pool) => Some(pool),
        }
    }

    pub fn stats(&self) -> CacheStats {
        match self {
            CacheBackend::Local(map) => CacheStats {
                local_entries: map.len(),
                mode: "local".to_string(),
            },
            CacheBackend::Redis(_) => CacheStats {
                local_entries: 0,
                mode: "redis".to_string(),
            },
        }
    }

    /// Drops expired local entries. A no-op in Redis mode, where the server
    /// expires keys itself.
    pub fn purge_expired(&self) -> usize {
        match self {
            CacheBackend::Local(map) => {
                let before = map.len();
                map.retain(|_, entry| !entry.is_expired());
                before - map.len()
            }
            CacheBackend::Redis(_) => 0,
        }
    }
}

/// Removes `key` only if the entry currently stored is expired, so a fresh
/// value written after the expired read survives.
fn evict_if_expired(map: &DashMap<String, CachedEntry>, key: &str) -> bool {
    map.remove_if(key, |_, entry| entry.is_expired()).is_some()
}

#[async_trait]
impl CacheStore for CacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self {
            CacheBackend::Local(map) => {
                if let Some(entry) = map.get(key) {
                    if !entry.is_expired() {
                        tracing::debug!(key = %key, "cache hit (local)");
                        return Ok(Some(entry.data.to_string()));
                    }
                    drop(entry);
                    evict_if_expired(map, key);
                }
                tracing::debug!(key = %key, "cache miss (local)");
                Ok(None)
            }
            CacheBackend::Redis(redis) => {
                let mut conn = redis
                    .get()
                    .await
                    .map_err(|e| CacheError::connection(e.to_string()))?;
                let value = conn
                    .get::<_, Option<String>>(key)
                    .await
                    .map_err(|e| CacheError::command(e.to_string()))?;
                match value {
                    Some(_) => tracing::debug!(key = %key, "cache hit (redis)"),
                    None => tracing::debug!(key = %key, "cache miss (redis)"),
                }
                Ok(value)
            }
        }
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        match self {
            CacheBackend::Local(map) => {
                map.insert(key.to_string(), CachedEntry::new(value, ttl));
                Ok(())
            }
            CacheBackend::Redis(redis) => {
                // SET EX rejects a zero expiry
                let ttl_secs = ttl.as_secs().max(1);
                let mut conn = redis
                    .get()
                    .await
                    .map_err(|e| CacheError::connection(e.to_string()))?;
                conn.set_ex::<_, _, ()>(key, value, ttl_secs)
                    .await
                    .map_err(|e| CacheError::command(e.to_string()))?;
                tracing::debug!(key = %key, ttl_secs = %ttl_secs, "cache set (redis)");
                Ok(())
            }
        }
    }

    async fn is_available(&self) -> bool {
        match self {
            CacheBackend::Local(_) => true,
            CacheBackend::Redis(redis) => redis.get().await.is_ok(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub local_entries: usize,
    pub mode: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_local_entry_expires_strictly_after_ttl() {
        let cache = CacheBackend::new_local();
        cache
            .set_ex("beanies", "[1]".to_string(), Duration::from_secs(30))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.get("beanies").await.unwrap().as_deref(), Some("[1]"));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("beanies").await.unwrap(), None);

        // Expired entries are removed on read
        assert_eq!(cache.stats().local_entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_restarts_ttl() {
        let cache = CacheBackend::new_local();
        cache
            .set_ex("gloves", "old".to_string(), Duration::from_secs(10))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        cache
            .set_ex("gloves", "new".to_string(), Duration::from_secs(10))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(cache.get("gloves").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = CacheBackend::new_local();
        cache
            .set_ex("a", "1".to_string(), Duration::from_secs(1))
            .await
            .unwrap();
        cache
            .set_ex("b", "2".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.stats().local_entries, 1);
        assert!(cache.is_available().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_spares_entry_rewritten_after_expired_read() {
        let map: DashMap<String, CachedEntry> = DashMap::new();
        map.insert("beanies".into(), CachedEntry::new("old".into(), Duration::from_secs(1)));
        tokio::time::advance(Duration::from_secs(2)).await;

        // A writer replaces the entry between the expired read and the eviction
        map.insert("beanies".into(), CachedEntry::new("new".into(), Duration::from_secs(60)));
        assert!(!evict_if_expired(&map, "beanies"));
        assert_eq!(map.get("beanies").map(|e| e.data.to_string()).as_deref(), Some("new"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(evict_if_expired(&map, "beanies"));
        assert!(map.is_empty());
    }
}
