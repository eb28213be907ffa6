//! # Sign-in Handshake Routes
//!
//! Routes:
//! - GET|POST /api/sign-in: issue a challenge, returns the authorization request
//! - POST     /api/callback?sessionId=…: verify the holder's proof token
//!
//! Handlers only translate between HTTP and the verifier crate. The
//! callback body is the raw token bytes, capped at [`MAX_TOKEN_BYTES`].

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;
use zkauth_core::SessionId;
use zkauth_protocol::token::MAX_TOKEN_BYTES;
use zkauth_protocol::AuthorizationRequest;
use zkauth_verifier::VerificationResult;

use crate::error::AppError;
use crate::middleware::metrics::{record_challenge_issued, record_verification};
use crate::state::AppState;

/// Build the handshake router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sign-in", get(sign_in).post(sign_in))
        .route(
            "/api/callback",
            post(callback).layer(DefaultBodyLimit::max(MAX_TOKEN_BYTES)),
        )
}

/// Query parameters of the callback.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    /// Session id from the issued callback URI.
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Issue a sign-in challenge.
///
/// Stores a new session and returns the authorization request the wallet
/// must answer. When a renderer is configured the same JSON bytes are
/// rendered off the request path; rendering failures are only logged.
#[utoipa::path(
    get,
    path = "/api/sign-in",
    responses(
        (status = 200, description = "Authorization request for the wallet"),
        (status = 503, description = "Too many pending sessions", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub async fn sign_in(State(state): State<AppState>) -> Result<Json<AuthorizationRequest>, AppError> {
    let issued = state.issuer.issue(state.config.scope.clone())?;
    record_challenge_issued();
    tracing::info!(session_id = %issued.session_id, "challenge issued");

    if let Some(renderer) = state.renderer.clone() {
        match serde_json::to_vec(&issued.request) {
            Ok(payload) => {
                let session_id = issued.session_id;
                tokio::task::spawn_blocking(move || {
                    if let Err(err) = renderer.render(session_id, &payload) {
                        tracing::warn!(%session_id, error = %err, "challenge rendering failed");
                    }
                });
            }
            Err(err) => tracing::warn!(error = %err, "challenge serialization for rendering failed"),
        }
    }

    Ok(Json(issued.request))
}

/// Verify a callback.
///
/// The body is the compact proof token exactly as sent by the wallet.
#[utoipa::path(
    post,
    path = "/api/callback",
    params(CallbackParams),
    request_body(content = String, content_type = "text/plain", description = "Compact proof token"),
    responses(
        (status = 200, description = "Verified holder and scope"),
        (status = 400, description = "Missing session id or malformed token", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown or expired session", body = crate::error::ErrorBody),
        (status = 409, description = "Session already used", body = crate::error::ErrorBody),
        (status = 422, description = "Proof rejected", body = crate::error::ErrorBody),
        (status = 500, description = "Verification key unavailable", body = crate::error::ErrorBody),
        (status = 503, description = "State resolver unavailable", body = crate::error::ErrorBody),
        (status = 504, description = "Resolver or engine timed out", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    body: Bytes,
) -> Result<Json<VerificationResult>, AppError> {
    let raw = params
        .session_id
        .ok_or_else(|| AppError::BadRequest("sessionId query parameter is required".into()))?;
    let session_id: SessionId = raw
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid sessionId \"{raw}\"")))?;

    let started = Instant::now();
    let outcome = state
        .verifier
        .verify(session_id, &body, state.config.accepted_state_delay)
        .await;

    match outcome {
        Ok(result) => {
            record_verification("verified", started.elapsed());
            tracing::info!(%session_id, holder = %result.holder, "holder authenticated");
            Ok(Json(result))
        }
        Err(err) => {
            record_verification(err.code(), started.elapsed());
            Err(err.into())
        }
    }
}
