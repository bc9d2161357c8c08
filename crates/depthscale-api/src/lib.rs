//! depthscale-api: HTTP surface for depthscale.
//!
//! Exposes the cache proxy as an invocation endpoint, lets external pools
//! publish their own metrics, and reports samples and pool capacities.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/invoke` | Run one cache proxy invocation |
//! | GET | `/api/v1/metrics` | Latest sample of every series |
//! | POST | `/api/v1/metrics` | Publish samples to the metric channel |
//! | GET | `/api/v1/metrics/{namespace}/{name}` | Latest sample of one series |
//! | GET | `/api/v1/pools` | List pool records |
//! | GET | `/api/v1/pools/{name}` | Get one pool record |
//! | GET | `/metrics` | Prometheus exposition |
//! | GET | `/healthz` | Liveness |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use depthscale_metrics::MetricChannel;
use depthscale_proxy::CacheProxy;
use depthscale_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub proxy: Arc<CacheProxy>,
    pub channel: Arc<dyn MetricChannel>,
}

/// Build the complete API router (invoke + REST + metrics).
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route(
            "/metrics",
            get(handlers::list_latest_metrics).post(handlers::publish_metrics),
        )
        .route("/metrics/{namespace}/{name}", get(handlers::get_latest_metric))
        .route("/pools", get(handlers::list_pools))
        .route("/pools/{name}", get(handlers::get_pool))
        .with_state(state.clone());

    Router::new()
        .route("/invoke", post(handlers::invoke))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
        .nest("/api/v1", api_routes)
}
