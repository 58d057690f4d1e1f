//! Storage abstraction layer for the storefront server.
//!
//! This crate defines the two storage seams the rest of the workspace is
//! written against:
//!
//! - [`CacheStore`]: a key/value store with per-key expiry (Redis in
//!   production, an in-process map for single-node use and tests)
//! - [`RecordStore`]: the authoritative source of product records
//!   (PostgreSQL in production)
//!
//! It also provides the shared domain types ([`ProductKey`],
//! [`ProductRecordSet`]) and an in-memory [`RecordStore`] used by tests.
//!
//! # Example
//!
//! ```ignore
//! use storefront_storage::{ProductKey, RecordStore};
//!
//! async fn load(store: &dyn RecordStore) -> Result<(), storefront_storage::RecordStoreError> {
//!     let key = ProductKey::new("beanies")?;
//!     let records = store.fetch_all(&key).await?;
//!     println!("{} beanies", records.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{CacheError, InvalidProductKey, RecordStoreError};
pub use memory::InMemoryRecordStore;
pub use traits::{CacheStore, DynCacheStore, DynRecordStore, RecordStore};
pub use types::{ProductKey, ProductRecordSet};
