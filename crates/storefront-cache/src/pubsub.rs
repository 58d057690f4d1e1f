//! Redis Pub/Sub for refresh notifications.
//!
//! The refresh job publishes a product key on [`REFRESH_CHANNEL`] after it has
//! rewritten that product's records. Server processes subscribe and re-warm
//! their cache entry for the key.
//!
//! ```text
//! refresh job: replace_all("beanies") → PUBLISH products:refreshed "beanies"
//!   ↓
//! server: listener receives "beanies" → handler.on_refresh("beanies")
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use tokio::task::JoinHandle;

use storefront_storage::{CacheError, ProductKey};

/// Channel carrying the keys of freshly refreshed products.
pub const REFRESH_CHANNEL: &str = "products:refreshed";

const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Receives refresh notifications.
#[async_trait]
pub trait RefreshHandler: Send + Sync {
    async fn on_refresh(&self, key: ProductKey);
}

/// Subscribes to [`REFRESH_CHANNEL`] and forwards every key to a handler.
pub struct RefreshListener {
    pub redis_url: String,
    pub handler: Arc<dyn RefreshHandler>,
}

impl RefreshListener {
    /// Spawns the listener task.
    ///
    /// The task reconnects with exponential backoff whenever the subscription
    /// drops, and runs until the returned handle is aborted.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);

            loop {
                match self.run().await {
                    Ok(()) => {
                        backoff = Duration::from_secs(1);
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            backoff_secs = backoff.as_secs(),
                            "Refresh listener error, reconnecting..."
                        );
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        })
    }

    async fn run(&self) -> Result<(), String> {
        use futures_util::StreamExt;

        let client = redis::Client::open(self.redis_url.clone())
            .map_err(|e| format!("failed to create Redis client: {e}"))?;

        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| format!("failed to get pub/sub connection: {e}"))?;

        pubsub
            .subscribe(REFRESH_CHANNEL)
            .await
            .map_err(|e| format!("failed to subscribe: {e}"))?;

        tracing::info!(channel = REFRESH_CHANNEL, "Subscribed to refresh notifications");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let payload = match msg.get_payload::<String>() {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse refresh message payload");
                    continue;
                }
            };
            match ProductKey::new(payload) {
                Ok(key) => {
                    tracing::debug!(key = %key, "received refresh notification");
                    self.handler.on_refresh(key).await;
                }
                Err(e) => tracing::warn!(error = %e, "ignoring refresh notification"),
            }
        }

        Err("pub/sub connection closed".to_string())
    }
}

/// Publishes refresh notifications from the refresh job.
#[derive(Clone)]
pub struct RefreshPublisher {
    redis: Pool,
}

impl RefreshPublisher {
    pub fn new(redis: Pool) -> Self {
        Self { redis }
    }

    /// Announces that the records for `key` were rewritten.
    pub async fn publish(&self, key: &ProductKey) -> Result<(), CacheError> {
        let mut conn = self
            .redis
            .get()
            .await
            .map_err(|e| CacheError::connection(e.to_string()))?;

        conn.publish::<_, _, ()>(REFRESH_CHANNEL, key.as_str())
            .await
            .map_err(|e| CacheError::command(format!("failed to publish refresh: {e}")))?;

        tracing::debug!(key = %key, "published refresh notification");
        Ok(())
    }
}
