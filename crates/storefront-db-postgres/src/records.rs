//! `RecordStore` implementation backed by PostgreSQL.

use async_trait::async_trait;
use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;
use tracing::{debug, instrument};

use storefront_storage::{ProductKey, ProductRecordSet, RecordStore, RecordStoreError};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, query_error};
use crate::ident::quote_identifier;
use crate::pool::create_pool;

/// PostgreSQL record store using one table per product key.
#[derive(Debug, Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Connects a new pool from `config`.
    pub async fn new(config: &PostgresConfig) -> Result<Self, PostgresError> {
        let pool = create_pool(config).await?;
        Ok(Self { pool })
    }

    /// Closes the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn fetch_all(&self, key: &ProductKey) -> Result<ProductRecordSet, RecordStoreError> {
        let table = quote_identifier(key.as_str())?;
        let sql = format!("SELECT record FROM {table} ORDER BY position");

        let rows: Vec<Value> = query_scalar(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error(key.as_str(), e))?;

        debug!(rows = rows.len(), "fetched product records");
        Ok(ProductRecordSet::new(rows))
    }

    #[instrument(skip(self, records), fields(key = %key, rows = records.len()))]
    async fn replace_all(
        &self,
        key: &ProductKey,
        records: &ProductRecordSet,
    ) -> Result<(), RecordStoreError> {
        let table = quote_identifier(key.as_str())?;
        let payload = Value::Array(records.records().to_vec());

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RecordStoreError::connection_error(e.to_string()))?;

        let create = format!(
            "CREATE TABLE IF NOT EXISTS {table} (position INTEGER PRIMARY KEY, record JSONB NOT NULL)"
        );
        query(&create)
            .execute(&mut *tx)
            .await
            .map_err(|e| query_error(key.as_str(), e))?;

        let delete = format!("DELETE FROM {table}");
        query(&delete)
            .execute(&mut *tx)
            .await
            .map_err(|e| query_error(key.as_str(), e))?;

        let insert = format!(
            r#"INSERT INTO {table} (position, record)
               SELECT (ord - 1)::int, value
               FROM jsonb_array_elements($1) WITH ORDINALITY AS t(value, ord)"#
        );
        query(&insert)
            .bind(&payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| query_error(key.as_str(), e))?;

        tx.commit()
            .await
            .map_err(|e| RecordStoreError::internal(format!("Failed to commit: {e}")))?;

        debug!("replaced product records");
        Ok(())
    }

    async fn ping(&self) -> Result<(), RecordStoreError> {
        query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| RecordStoreError::connection_error(e.to_string()))?;
        Ok(())
    }
}
