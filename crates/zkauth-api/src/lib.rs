//! # zkauth-api: Axum Verifier Service
//!
//! HTTP face of the verifier. Issues sign-in challenges, verifies the proof
//! tokens wallets post back, and exposes the operational endpoints.
//!
//! ## Routes
//!
//! - `GET|POST /api/sign-in`: issue a challenge
//! - `POST /api/callback?sessionId=…`: verify a proof token
//! - `/`, `/health/*`: banner and Kubernetes probes
//! - `/metrics`: Prometheus scrape
//! - `/openapi.json`: OpenAPI 3.1 document
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → MetricsMiddleware → Handler
//!
//! ## Crate Policy
//!
//! - No verification logic in route handlers. Handlers delegate to
//!   `zkauth-verifier` and translate its results.
//! - All errors map to structured HTTP responses via [`AppError`].

pub mod error;
pub mod middleware;
pub mod openapi;
pub mod render;
pub mod routes;
pub mod state;
pub mod sweeper;

use axum::middleware::from_fn;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::{AppConfig, AppState};

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::auth::router())
        .merge(openapi::router())
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
