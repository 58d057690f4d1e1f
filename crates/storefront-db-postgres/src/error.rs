//! Error types for the PostgreSQL record store.

use sqlx_core::error::Error as SqlxError;
use storefront_storage::RecordStoreError;

/// PostgreSQL error code for undefined table (42P01).
pub const PG_UNDEFINED_TABLE: &str = "42P01";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Checks if a sqlx error is "undefined table" (42P01).
pub fn is_undefined_table(err: &SqlxError) -> bool {
    has_pg_error_code(err, PG_UNDEFINED_TABLE)
}

/// Errors specific to the PostgreSQL record store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(#[from] SqlxError),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for RecordStoreError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(e) => RecordStoreError::connection_error(e.to_string()),
            PostgresError::Config { message } => {
                RecordStoreError::internal(format!("Configuration error: {message}"))
            }
        }
    }
}

/// Maps a query failure for `key` onto the storage error taxonomy.
pub(crate) fn query_error(key: &str, err: SqlxError) -> RecordStoreError {
    if is_undefined_table(&err) {
        return RecordStoreError::not_found(key);
    }
    match err {
        SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => {
            RecordStoreError::connection_error(err.to_string())
        }
        other => RecordStoreError::query(format!("Failed to query {key}: {other}")),
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostgresError::config("invalid URL");
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_conversion_to_record_store_error() {
        let pg_err = PostgresError::config("test error");
        let store_err: RecordStoreError = pg_err.into();
        assert!(matches!(store_err, RecordStoreError::Internal { .. }));
    }

    #[test]
    fn test_pool_timeout_is_connection_error() {
        let err = query_error("beanies", SqlxError::PoolTimedOut);
        assert!(matches!(err, RecordStoreError::ConnectionError { .. }));
    }

    #[test]
    fn test_non_database_error_is_not_undefined_table() {
        assert!(!is_undefined_table(&SqlxError::RowNotFound));
        let err = query_error("beanies", SqlxError::RowNotFound);
        assert!(matches!(err, RecordStoreError::Query { .. }));
    }
}
