//! # Health and Operations Routes
//!
//! Unversioned operational endpoints: banner, Kubernetes probes, and the
//! Prometheus scrape.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// Build the health router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics))
}

/// Service banner.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service banner", body = String)),
    tag = "health"
)]
pub async fn home() -> &'static str {
    "Verifier is running!"
}

/// Liveness probe: always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/health/liveness",
    responses((status = 200, description = "Process is alive", body = String)),
    tag = "health"
)]
pub async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe.
///
/// Keys are preloaded and resolvers registered before the listener binds,
/// so the remaining check is that at least one resolver is available.
#[utoipa::path(
    get,
    path = "/health/readiness",
    responses(
        (status = 200, description = "Ready to verify callbacks", body = String),
        (status = 503, description = "No state resolver registered", body = String),
    ),
    tag = "health"
)]
pub async fn readiness(State(state): State<AppState>) -> Response {
    if state.verifier.resolvers().is_empty() {
        return (StatusCode::SERVICE_UNAVAILABLE, "no state resolvers").into_response();
    }
    (StatusCode::OK, "ready").into_response()
}

/// GET /metrics: Prometheus text exposition.
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
