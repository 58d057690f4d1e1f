//! Storage traits.
//!
//! Implementations must be thread-safe (`Send + Sync`): one instance is
//! created at process start and shared by every request through an `Arc`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CacheError, RecordStoreError};
use crate::types::{ProductKey, ProductRecordSet};

/// A key/value store with per-key expiry.
///
/// Values are serialized payloads; the store never interprets them. Expiry is
/// the store's responsibility: an entry written with a TTL must not be
/// returned by `get` once the TTL has elapsed.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// Returns `Ok(None)` for a missing or expired key. Errors are reserved
    /// for infrastructure failures.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key`, expiring after `ttl`.
    ///
    /// Overwrites any existing entry and restarts its TTL.
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Reports whether the backend can currently be reached.
    async fn is_available(&self) -> bool;
}

/// The authoritative source of product records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns every record stored for `key`, in storage order.
    ///
    /// # Errors
    ///
    /// Returns `RecordStoreError::NotFound` if no table exists for `key`.
    async fn fetch_all(&self, key: &ProductKey) -> Result<ProductRecordSet, RecordStoreError>;

    /// Replaces the records stored for `key`, creating the table if needed.
    ///
    /// Used by the refresh job only; the request path never writes.
    async fn replace_all(
        &self,
        key: &ProductKey,
        records: &ProductRecordSet,
    ) -> Result<(), RecordStoreError>;

    /// Checks that the store answers queries.
    async fn ping(&self) -> Result<(), RecordStoreError>;
}

/// Type alias for a shareable cache store.
pub type DynCacheStore = Arc<dyn CacheStore>;

/// Type alias for a shareable record store.
pub type DynRecordStore = Arc<dyn RecordStore>;
