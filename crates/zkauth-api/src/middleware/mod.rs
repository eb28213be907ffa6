//! # Middleware Stack
//!
//! Tower middleware for the API layer:
//! - [`metrics`]: Prometheus request and handshake metrics.
//!
//! Request tracing uses `tower_http::trace::TraceLayer` directly.

pub mod metrics;
