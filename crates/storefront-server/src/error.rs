//! API errors and their HTTP mapping.
//!
//! Error bodies are fixed plain-text messages; clients match on them.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::gate::GateError;
use crate::resolver::ResolveError;

pub const MISSING_CREDENTIAL_MESSAGE: &str = "Proper authorization credentials were not provided.";
pub const INVALID_CREDENTIAL_MESSAGE: &str = "Invalid authentication credentials.";
pub const UNSUPPORTED_VERSION_MESSAGE: &str = "Unsupported API version.";
pub const MISSING_PRODUCT_MESSAGE: &str = "A product must be specified.";
pub const INTERNAL_ERROR_MESSAGE: &str = "Failed to load product data.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing credential")]
    MissingCredential,
    #[error("invalid credential")]
    InvalidCredential,
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("missing product")]
    MissingProduct,
    #[error("product {0} does not exist")]
    ProductNotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingCredential => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredential => StatusCode::FORBIDDEN,
            ApiError::UnsupportedVersion | ApiError::MissingProduct => StatusCode::BAD_REQUEST,
            ApiError::ProductNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The client-facing message. Internal details are never included.
    pub fn message(&self) -> String {
        match self {
            ApiError::MissingCredential => MISSING_CREDENTIAL_MESSAGE.to_string(),
            ApiError::InvalidCredential => INVALID_CREDENTIAL_MESSAGE.to_string(),
            ApiError::UnsupportedVersion => UNSUPPORTED_VERSION_MESSAGE.to_string(),
            ApiError::MissingProduct => MISSING_PRODUCT_MESSAGE.to_string(),
            ApiError::ProductNotFound(key) => format!("The requested product {key} does not exist."),
            ApiError::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(ref detail) = self {
            tracing::error!(error = %detail, "request failed");
        }
        (self.status_code(), self.message()).into_response()
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::MissingCredential => ApiError::MissingCredential,
            GateError::InvalidCredential => ApiError::InvalidCredential,
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(key) => ApiError::ProductNotFound(key.to_string()),
            ResolveError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::MissingCredential.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidCredential.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::ProductNotFound("tophats".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_message_names_product() {
        assert_eq!(
            ApiError::ProductNotFound("tophats".into()).message(),
            "The requested product tophats does not exist."
        );
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err = ApiError::Internal("password authentication failed".into());
        assert_eq!(err.message(), INTERNAL_ERROR_MESSAGE);
    }
}
