//! Static shared-secret access gate.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::ApiError;

/// Header carrying the shared secret.
pub const CREDENTIAL_HEADER: &str = "x-web-token";
/// Header carrying the protocol version.
pub const VERSION_HEADER: &str = "x-version";
/// Header carrying the product key.
pub const PRODUCT_HEADER: &str = "x-product";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("credential header missing")]
    MissingCredential,
    #[error("credential does not match")]
    InvalidCredential,
}

/// Compares the credential header against one configured secret.
///
/// The comparison is exact (case-sensitive) and constant-time over the
/// secret's bytes. An empty header counts as missing.
pub struct AccessGate {
    secret: Vec<u8>,
}

impl AccessGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into().into_bytes(),
        }
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), GateError> {
        let presented = match headers.get(CREDENTIAL_HEADER) {
            Some(value) if !value.is_empty() => value.as_bytes(),
            _ => return Err(GateError::MissingCredential),
        };

        if bool::from(presented.ct_eq(&self.secret)) {
            Ok(())
        } else {
            Err(GateError::InvalidCredential)
        }
    }
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate").finish_non_exhaustive()
    }
}

/// Middleware rejecting requests that fail the gate before any handler runs.
pub async fn access_gate(
    State(gate): State<Arc<AccessGate>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    match gate.authorize(req.headers()) {
        Ok(()) => next.run(req).await,
        Err(e) => {
            tracing::debug!(reason = %e, path = %req.uri().path(), "access denied");
            ApiError::from(e).into_response()
        }
    }
}
