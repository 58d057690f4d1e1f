//! Cache-aside resolution of product record sets.
//!
//! ## Lookup Order
//!
//! ```text
//! resolve(key) → CacheStore.get(key) ──hit──→ records
//!                      │
//!                    miss / falsy / error
//!                      ↓
//!               RecordStore.fetch_all(key) → records
//!                      ↓ (detached)
//!               CacheStore.set_ex(key, json, ttl)
//! ```
//!
//! A cached value that decodes to JSON null, an empty array or any other
//! falsy value counts as a miss. This also means a product whose table is
//! legitimately empty is read from the record store on every request.
//!
//! Concurrent misses for the same key are not coordinated: each one queries
//! the record store and writes the cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use storefront_cache::RefreshHandler;
use storefront_storage::{
    DynCacheStore, DynRecordStore, ProductKey, ProductRecordSet, RecordStoreError,
};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("product {0} does not exist")]
    NotFound(ProductKey),
    #[error(transparent)]
    Store(RecordStoreError),
}

impl ResolveError {
    fn from_store(key: &ProductKey, err: RecordStoreError) -> Self {
        match err {
            // A key that cannot name a table has no table
            RecordStoreError::NotFound { .. } | RecordStoreError::InvalidKey { .. } => {
                ResolveError::NotFound(key.clone())
            }
            other => ResolveError::Store(other),
        }
    }
}

pub struct Resolver {
    cache: DynCacheStore,
    records: DynRecordStore,
    ttl: Duration,
}

impl Resolver {
    pub fn new(cache: DynCacheStore, records: DynRecordStore, ttl: Duration) -> Self {
        Self {
            cache,
            records,
            ttl,
        }
    }

    /// Returns the current record set for `key`.
    ///
    /// Cache failures never surface here; only record store failures do.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn resolve(&self, key: &ProductKey) -> Result<ProductRecordSet, ResolveError> {
        if let Some(records) = self.lookup(key).await {
            return Ok(records);
        }

        let records = self
            .records
            .fetch_all(key)
            .await
            .map_err(|e| ResolveError::from_store(key, e))?;
        tracing::debug!(rows = records.len(), "served from record store");

        self.write_back(key, &records);
        Ok(records)
    }

    /// Re-reads `key` from the record store and rewrites its cache entry,
    /// waiting for the write to land.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn warm(&self, key: &ProductKey) -> Result<ProductRecordSet, ResolveError> {
        let records = self
            .records
            .fetch_all(key)
            .await
            .map_err(|e| ResolveError::from_store(key, e))?;

        match serde_json::to_string(&records) {
            Ok(payload) => {
                if let Err(e) = self.cache.set_ex(key.as_str(), payload, self.ttl).await {
                    tracing::warn!(error = %e, "cache warm write failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize records for cache"),
        }
        Ok(records)
    }

    async fn lookup(&self, key: &ProductKey) -> Option<ProductRecordSet> {
        let payload = match self.cache.get(key.as_str()).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "cache read failed, falling back to record store");
                return None;
            }
        };

        match decode_cached(&payload) {
            Ok(Some(records)) => {
                tracing::debug!(rows = records.len(), "served from cache");
                Some(records)
            }
            Ok(None) => {
                tracing::debug!("cached value is empty, treating as miss");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed cache entry, falling back to record store");
                None
            }
        }
    }

    /// Writes the record set to the cache on a detached task.
    fn write_back(&self, key: &ProductKey, records: &ProductRecordSet) {
        let payload = match serde_json::to_string(records) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to serialize records for cache");
                return;
            }
        };

        let cache = Arc::clone(&self.cache);
        let key = key.clone();
        let ttl = self.ttl;
        tokio::spawn(async move {
            match cache.set_ex(key.as_str(), payload, ttl).await {
                Ok(()) => tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "cache populated"),
                Err(e) => tracing::warn!(key = %key, error = %e, "cache write failed"),
            }
        });
    }
}

#[async_trait]
impl RefreshHandler for Resolver {
    async fn on_refresh(&self, key: ProductKey) {
        match self.warm(&key).await {
            Ok(records) => tracing::info!(key = %key, rows = records.len(), "cache re-warmed"),
            Err(e) => tracing::warn!(key = %key, error = %e, "cache re-warm failed"),
        }
    }
}

/// Decodes a cached payload. `Ok(None)` means the payload is falsy.
fn decode_cached(payload: &str) -> Result<Option<ProductRecordSet>, serde_json::Error> {
    let value: Value = serde_json::from_str(payload)?;
    if is_falsy(&value) {
        return Ok(None);
    }
    serde_json::from_value(value).map(Some)
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(_) => false,
    }
}
