//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sky_common::{CutoutRequest, SkyError, TileQuery};
use storage::CacheStats;
use tracing::{debug, info, instrument, warn};

use crate::error::ApiError;
use crate::state::AppState;

pub const X_CACHE: &str = "x-cache";
pub const X_CACHE_KEY: &str = "x-cache-key";

// ============================================================================
// Tiles
// ============================================================================

/// GET /tile - Render (or reuse) a survey cutout and return the PNG.
#[instrument(skip(state))]
pub async fn tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<TileQuery>,
) -> Result<Response, ApiError> {
    let request = CutoutRequest::try_from(query).map_err(|e| {
        warn!(error = %e, "Rejected tile query");
        ApiError(e)
    })?;
    let key = request.cache_key();
    debug!(key = %key, position = %request.canonical_position(), "Tile request validated");

    // Once dispatched the pipeline runs to completion even if the client leaves.
    let pipeline = Arc::clone(&state.pipeline);
    let product = tokio::spawn(async move { pipeline.run(&request).await })
        .await
        .map_err(|e| SkyError::Internal(format!("Tile task failed: {}", e)))??;

    let png = tokio::fs::read(&product.rendered_path).await.map_err(|e| {
        SkyError::StoreIo(format!(
            "failed to read {}: {}",
            product.rendered_path.display(),
            e
        ))
    })?;

    let mut response = (StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], png).into_response();
    let headers = response.headers_mut();
    headers.insert(X_CACHE, HeaderValue::from_static(product.cache_status.as_str()));
    if let Ok(value) = HeaderValue::from_str(key.as_str()) {
        headers.insert(X_CACHE_KEY, value);
    }
    Ok(response)
}

// ============================================================================
// Service info
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub version: &'static str,
}

/// GET / - Service banner.
pub async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        status: "ok",
        message: "Visit /app for the prototype UI.",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health - Basic health check
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub started_at: String,
    pub uptime_seconds: i64,
    pub cache_dir: String,
    pub cache: CacheStats,
    pub cache_hit_rate: f64,
    pub in_flight: usize,
    pub proxy_enabled: bool,
}

/// GET /status - Cache statistics and in-flight work.
#[instrument(skip(state))]
pub async fn status_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let cache = state.pipeline.cache();
    let stats = cache.stats().await?;
    let now = chrono::Utc::now();

    Ok(Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: now.to_rfc3339(),
        started_at: state.started_at.to_rfc3339(),
        uptime_seconds: (now - state.started_at).num_seconds(),
        cache_dir: cache.root().display().to_string(),
        cache_hit_rate: stats.hit_rate(),
        cache: stats,
        in_flight: cache.in_flight(),
        proxy_enabled: state.proxy.is_some(),
    }))
}

/// GET /metrics - Prometheus metrics endpoint
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus.render(),
    )
        .into_response()
}

/// GET /favicon.ico - Served from the web directory when present.
pub async fn favicon_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let path = state.config.web.dir.join("favicon.ico");
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "image/x-icon")],
            bytes,
        )
            .into_response(),
        Err(_) => StatusCode::NO_CONTENT.into_response(),
    }
}

// ============================================================================
// Proxy
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub q: Option<String>,
}

/// GET /proxy/?q=<url> - Relay an allow-listed URL.
#[instrument(skip(state))]
pub async fn proxy_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, ApiError> {
    let proxy = state.proxy.as_ref().ok_or(SkyError::ProxyDisabled)?;

    let target = query
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| SkyError::MalformedUrl("missing 'q' parameter".to_string()))?;

    let url = proxy.check_target(&target).map_err(|e| {
        warn!(target = %target, error = %e, "Proxy target rejected");
        ApiError(e)
    })?;

    let relayed = proxy.relay(url).await?;
    info!(target = %target, status = relayed.status.as_u16(), "Proxied request");

    let status = StatusCode::from_u16(relayed.status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = (status, relayed.body).into_response();
    if let Some(value) = relayed
        .content_type
        .and_then(|ct| HeaderValue::from_str(&ct).ok())
    {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    Ok(response)
}
