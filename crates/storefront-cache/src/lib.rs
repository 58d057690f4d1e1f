//! Cache store backends for the storefront server.
//!
//! ## Cache Modes
//!
//! - **Local (DashMap)**: in-process, per-instance; used when Redis is
//!   disabled or unreachable
//! - **Redis**: shared across processes; `SET key value EX ttl`
//!
//! ## Graceful Degradation
//!
//! If Redis cannot be reached at startup, [`create_cache_backend`] falls back
//! to local mode so the server still starts. Read failures at runtime are the
//! caller's to handle (the resolver treats them as misses).

pub mod backend;
pub mod config;
pub mod pubsub;

use std::time::Duration;

pub use backend::{CacheBackend, CacheStats, CachedEntry};
pub use config::RedisConfig;
pub use pubsub::{REFRESH_CHANNEL, RefreshHandler, RefreshListener, RefreshPublisher};

/// Creates a Redis connection pool and checks that a connection can be made.
pub async fn create_redis_pool(config: &RedisConfig) -> Result<deadpool_redis::Pool, String> {
    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let timeout = Duration::from_millis(config.timeout_ms);
    let pool_config = redis_config.pool.get_or_insert_with(Default::default);
    pool_config.max_size = config.pool_size;
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);

    let pool = redis_config
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .map_err(|e| format!("failed to create Redis pool: {e}"))?;

    pool.get()
        .await
        .map_err(|e| format!("failed to connect to Redis: {e}"))?;

    Ok(pool)
}

/// Create a cache backend based on configuration.
///
/// - **Redis disabled**: returns a local-only cache
/// - **Redis enabled**: connects to Redis, falling back to local on failure
pub async fn create_cache_backend(config: &RedisConfig) -> CacheBackend {
    if !config.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return CacheBackend::new_local();
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    match create_redis_pool(config).await {
        Ok(pool) => {
            tracing::info!("Connected to Redis successfully");
            CacheBackend::new_redis(pool)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Redis unavailable. Falling back to local cache."
            );
            CacheBackend::new_local()
        }
    }
}
