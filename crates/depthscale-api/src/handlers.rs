//! HTTP handlers.
//!
//! REST handlers return the `{success, data?, error?}` envelope; `/invoke`
//! returns the proxy response object as is.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use depthscale_core::MetricDatum;
use depthscale_metrics::ChannelError;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Proxy ──────────────────────────────────────────────────────

/// POST /invoke
pub async fn invoke(State(state): State<ApiState>, Json(event): Json<Value>) -> impl IntoResponse {
    let resp = state.proxy.handle(&event).await;
    let status = StatusCode::from_u16(resp.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(resp))
}

// ── Metrics ────────────────────────────────────────────────────

/// Publish request body.
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub namespace: String,
    pub samples: Vec<MetricDatum>,
}

/// POST /api/v1/metrics
pub async fn publish_metrics(
    State(state): State<ApiState>,
    Json(req): Json<PublishRequest>,
) -> impl IntoResponse {
    match state.channel.publish(&req.namespace, req.samples).await {
        Ok(samples) => {
            debug!(namespace = %req.namespace, count = samples.len(), "samples published via api");
            ApiResponse::ok(samples).into_response()
        }
        Err(e @ ChannelError::Store(_)) => {
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    }
}

/// GET /api/v1/metrics
pub async fn list_latest_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.latest_samples() {
        Ok(samples) => ApiResponse::ok(samples).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/metrics/{namespace}/{name}
pub async fn get_latest_metric(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.channel.latest(&namespace, &name).await {
        Ok(Some(sample)) => ApiResponse::ok(sample).into_response(),
        Ok(None) => error_response("no samples for series", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Pools ──────────────────────────────────────────────────────

/// GET /api/v1/pools
pub async fn list_pools(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_pools() {
        Ok(pools) => ApiResponse::ok(pools).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/pools/{name}
pub async fn get_pool(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.store.get_pool(&name) {
        Ok(Some(record)) => ApiResponse::ok(record).into_response(),
        Ok(None) => error_response("pool not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let samples = state.store.latest_samples().unwrap_or_default();
    let pools = state.store.list_pools().unwrap_or_default();

    let body = depthscale_metrics::render_prometheus(&samples, &pools, state.proxy.counters());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok(serde_json::json!({ "status": "ok" }))
}
