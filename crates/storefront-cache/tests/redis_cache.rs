//! Integration tests for the cache backends.
//!
//! Redis tests use testcontainers to spin up a real Redis instance.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use storefront_cache::{
    CacheBackend, RedisConfig, RefreshHandler, RefreshListener, RefreshPublisher,
    create_cache_backend,
};
use storefront_storage::{CacheStore, ProductKey};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::{OnceCell, mpsc};

static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{host_port}");

            (container, url)
        })
        .await;

    url.clone()
}

fn redis_config(url: String) -> RedisConfig {
    RedisConfig {
        enabled: true,
        url,
        pool_size: 5,
        timeout_ms: 5000,
    }
}

#[tokio::test]
async fn test_disabled_redis_uses_local_cache() {
    let cache = create_cache_backend(&RedisConfig::default()).await;
    assert_eq!(cache.stats().mode, "local");

    cache
        .set_ex("beanies", "[]".to_string(), Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(cache.get("beanies").await.unwrap().as_deref(), Some("[]"));
}

#[tokio::test]
async fn test_unreachable_redis_falls_back_to_local() {
    let config = RedisConfig {
        timeout_ms: 200,
        ..redis_config("redis://127.0.0.1:1".to_string())
    };
    let cache = create_cache_backend(&config).await;
    assert!(matches!(cache, CacheBackend::Local(_)));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_get_set_and_expiry() {
    let cache = create_cache_backend(&redis_config(get_redis_url().await)).await;
    assert!(cache.is_available().await);
    assert_eq!(cache.stats().mode, "redis");

    cache
        .set_ex("facemasks", r#"[{"id":"f1"}]"#.to_string(), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(
        cache.get("facemasks").await.unwrap().as_deref(),
        Some(r#"[{"id":"f1"}]"#)
    );

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(cache.get("facemasks").await.unwrap(), None);
}

struct ChannelHandler(mpsc::UnboundedSender<ProductKey>);

#[async_trait]
impl RefreshHandler for ChannelHandler {
    async fn on_refresh(&self, key: ProductKey) {
        let _ = self.0.send(key);
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_refresh_notification_reaches_listener() {
    let url = get_redis_url().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let listener = RefreshListener {
        redis_url: url.clone(),
        handler: Arc::new(ChannelHandler(tx)),
    }
    .start();

    // Give the subscription time to be established
    tokio::time::sleep(Duration::from_millis(300)).await;

    let pool = storefront_cache::create_redis_pool(&redis_config(url))
        .await
        .expect("pool");
    let publisher = RefreshPublisher::new(pool);
    publisher
        .publish(&ProductKey::new("gloves").unwrap())
        .await
        .expect("publish");

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("notification in time")
        .expect("channel open");
    assert_eq!(received.as_str(), "gloves");

    listener.abort();
}
