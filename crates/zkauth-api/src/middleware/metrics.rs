//! # Prometheus Metrics
//!
//! Metrics go through the `metrics` facade and are exported by
//! `metrics-exporter-prometheus`. HTTP-level counters are recorded in
//! [`metrics_middleware`]; handshake outcomes are recorded by the auth
//! handlers through [`record_challenge_issued`] and [`record_verification`].
//!
//! Without an installed recorder every call here is a no-op, so handlers
//! and tests never need to care whether metrics are enabled.

use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Total HTTP requests by method, route, and status.
pub const HTTP_REQUESTS_TOTAL: &str = "zkauth_http_requests_total";
/// HTTP request latency by method and route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "zkauth_http_request_duration_seconds";
/// Challenges issued.
pub const CHALLENGES_ISSUED_TOTAL: &str = "zkauth_challenges_issued_total";
/// Callbacks by outcome (`verified` or an error code).
pub const VERIFICATIONS_TOTAL: &str = "zkauth_verifications_total";
/// Callback verification latency.
pub const VERIFICATION_SECONDS: &str = "zkauth_verification_seconds";

/// Install the process-wide Prometheus recorder.
///
/// May only succeed once per process.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Middleware that records request counts and latency.
///
/// Routes are labelled by their matched pattern, never the raw URI, so
/// query strings carrying session ids stay out of label values.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status)
        .increment(1);
    metrics::histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path)
        .record(start.elapsed().as_secs_f64());

    response
}

/// Count one issued challenge.
pub fn record_challenge_issued() {
    metrics::counter!(CHALLENGES_ISSUED_TOTAL).increment(1);
}

/// Count one callback and record how long verification took.
pub fn record_verification(outcome: &'static str, elapsed: Duration) {
    metrics::counter!(VERIFICATIONS_TOTAL, "outcome" => outcome).increment(1);
    metrics::histogram!(VERIFICATION_SECONDS).record(elapsed.as_secs_f64());
}
