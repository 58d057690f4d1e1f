use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;

use storefront_storage::{CacheStore, ProductKey, ProductRecordSet};

use crate::error::ApiError;
use crate::gate::{PRODUCT_HEADER, VERSION_HEADER};
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    pub status: &'a str,
}

#[derive(Serialize)]
pub struct ReadinessResponse<'a> {
    pub status: &'a str,
    pub record_store: &'a str,
    pub cache: &'a str,
    pub cache_mode: String,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Ready once the record store answers a ping. The cache is reported only,
/// since reads degrade to the record store without it.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let store_ok = match state.records.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check: record store unavailable");
            false
        }
    };
    let cache_ok = state.cache.is_available().await;

    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = ReadinessResponse {
        status: if store_ok { "ready" } else { "unavailable" },
        record_store: if store_ok { "up" } else { "down" },
        cache: if cache_ok { "up" } else { "down" },
        cache_mode: state.cache.stats().mode,
    };
    (status, Json(body))
}

/// `GET /` behind the access gate.
pub async fn get_product(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProductRecordSet>, ApiError> {
    let version = header_str(&headers, VERSION_HEADER).ok_or(ApiError::UnsupportedVersion)?;
    if !state.api.supports(version) {
        tracing::debug!(version, "unsupported api version");
        return Err(ApiError::UnsupportedVersion);
    }

    let key = header_str(&headers, PRODUCT_HEADER)
        .and_then(|raw| ProductKey::new(raw).ok())
        .ok_or(ApiError::MissingProduct)?;

    let records = state.resolver.resolve(&key).await?;
    Ok(Json(records))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
