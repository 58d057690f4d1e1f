//! Storage error types.
//!
//! Cache failures and record store failures are kept apart because callers
//! treat them differently: a cache failure degrades to a miss, a record store
//! failure is surfaced.

/// Errors raised by a [`CacheStore`](crate::CacheStore).
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cache backend could not be reached.
    #[error("Cache connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The cache backend rejected or failed a command.
    #[error("Cache command error: {message}")]
    Command {
        /// Description of the command error.
        message: String,
    },
}

impl CacheError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Command` error.
    #[must_use]
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }
}

/// Errors raised by a [`RecordStore`](crate::RecordStore).
#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    /// No table or collection exists for the requested product.
    #[error("Product not found: {key}")]
    NotFound {
        /// The product key that has no backing table.
        key: String,
    },

    /// The product key cannot be used as a store identifier.
    #[error("Invalid product key: {message}")]
    InvalidKey {
        /// Why the key was rejected.
        message: String,
    },

    /// Failed to connect to the store.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// A query against the store failed.
    #[error("Query error: {message}")]
    Query {
        /// Description of the query error.
        message: String,
    },

    /// An internal store error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl RecordStoreError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Creates a new `Query` error.
    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A product key failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidProductKey {
    #[error("product key must not be empty")]
    Empty,
}

impl From<InvalidProductKey> for RecordStoreError {
    fn from(err: InvalidProductKey) -> Self {
        RecordStoreError::invalid_key(err.to_string())
    }
}
