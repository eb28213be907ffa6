//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI 3.1 spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the verifier's HTTP surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "zkauth verifier",
        version = "0.1.0",
        description = "Verifier side of a zero-knowledge sign-in handshake.\n\n1. `/api/sign-in` issues an authorization request bound to a fresh session.\n2. The wallet answers by posting a compact proof token to the callback URI carried in that request.\n3. `/api/callback` verifies the token and returns the authenticated holder and verified scope.\n\nFailures carry a stable machine-readable `error.code`."
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        // ── Handshake ────────────────────────────────────────────────────
        crate::routes::auth::sign_in,
        crate::routes::auth::callback,
        // ── Health ───────────────────────────────────────────────────────
        crate::routes::health::home,
        crate::routes::health::liveness,
        crate::routes::health::readiness,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
        )
    ),
    tags(
        (name = "auth", description = "Challenge issuance and proof-token callback"),
        (name = "health", description = "Service banner and Kubernetes probes"),
    )
)]
pub struct ApiDoc;

/// Router serving the spec.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_handshake_paths() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&String> = spec.paths.paths.keys().collect();
        for expected in ["/api/sign-in", "/api/callback", "/health/liveness", "/health/readiness", "/"] {
            assert!(paths.iter().any(|p| p.as_str() == expected), "missing {expected}");
        }
    }

    #[test]
    fn callback_documents_session_id_parameter() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let params = &json["paths"]["/api/callback"]["post"]["parameters"];
        assert_eq!(params[0]["name"], "sessionId");
        assert_eq!(params[0]["in"], "query");
    }

    #[test]
    fn error_schema_registered() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert!(json["components"]["schemas"]["ErrorBody"].is_object());
    }
}
