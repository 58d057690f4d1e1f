//! In-memory record store.
//!
//! Backs the server in tests and local development. Counts `fetch_all` calls
//! so callers can assert how often the authoritative store was consulted.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::RecordStoreError;
use crate::traits::RecordStore;
use crate::types::{ProductKey, ProductRecordSet};

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: DashMap<ProductKey, ProductRecordSet>,
    queries: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a table without going through the trait.
    pub fn insert(&self, key: ProductKey, records: ProductRecordSet) {
        self.tables.insert(key, records);
    }

    /// Number of `fetch_all` calls served so far, including failed ones.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Makes every subsequent operation fail with a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), RecordStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RecordStoreError::connection_error("in-memory store marked unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn fetch_all(&self, key: &ProductKey) -> Result<ProductRecordSet, RecordStoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.tables
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RecordStoreError::not_found(key.as_str()))
    }

    async fn replace_all(
        &self,
        key: &ProductKey,
        records: &ProductRecordSet,
    ) -> Result<(), RecordStoreError> {
        self.check_available()?;
        self.tables.insert(key.clone(), records.clone());
        tracing::debug!(key = %key, rows = records.len(), "replaced in-memory table");
        Ok(())
    }

    async fn ping(&self) -> Result<(), RecordStoreError> {
        self.check_available()
    }
}
