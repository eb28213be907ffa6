//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Verification failures keep their machine-readable code; the status
//! follows who is at fault:
//!
//! | Kind | Status |
//! |------|--------|
//! | `SESSION_NOT_FOUND` | 404 |
//! | `SESSION_ALREADY_USED` | 409 |
//! | `MALFORMED_TOKEN`, bad query parameters | 400 |
//! | proof binding and validity failures | 422 |
//! | `KEY_NOT_FOUND` | 500 |
//! | `RESOLVER_UNAVAILABLE`, session capacity | 503 |
//! | `RESOLVER_TIMEOUT`, `VERIFICATION_TIMEOUT` | 504 |
//!
//! 5xx responses carry a fixed message per kind. The underlying cause is
//! only logged.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;
use zkauth_verifier::{IssueError, StoreError, VerificationError};

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "INVALID_PROOF").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Request could not be interpreted (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A callback failed verification.
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// A challenge could not be issued.
    #[error(transparent)]
    Issue(#[from] IssueError),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Verification(err) => (verification_status(err), err.code()),
            Self::Issue(IssueError::Store(StoreError::CapacityExceeded(_))) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SESSION_CAPACITY_EXCEEDED")
            }
            Self::Issue(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }

    /// Client-safe message.
    fn public_message(&self) -> String {
        match self {
            Self::Verification(VerificationError::KeyNotFound(_)) => {
                "Verification key unavailable".to_string()
            }
            Self::Verification(VerificationError::ResolverUnavailable(_)) => {
                "Identity state resolver unavailable".to_string()
            }
            Self::Verification(VerificationError::ResolverTimeout(_)) => {
                "Identity state resolver timed out".to_string()
            }
            Self::Verification(VerificationError::VerificationTimeout(_)) => {
                "Proof verification timed out".to_string()
            }
            Self::Issue(IssueError::Store(StoreError::CapacityExceeded(_))) => {
                "Too many pending sign-in sessions".to_string()
            }
            Self::Issue(_) | Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Verification(
                VerificationError::QueryMismatch { request_id, .. }
                | VerificationError::ProofExpired { request_id, .. },
            ) => Some(json!({ "requestId": request_id })),
            Self::Verification(VerificationError::MissingProof { request_id, circuit }) => {
                Some(json!({ "requestId": request_id, "circuitId": circuit }))
            }
            _ => None,
        }
    }
}

fn verification_status(err: &VerificationError) -> StatusCode {
    match err {
        VerificationError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        VerificationError::SessionAlreadyUsed(_) => StatusCode::CONFLICT,
        VerificationError::MalformedToken(_) => StatusCode::BAD_REQUEST,
        VerificationError::MissingProof { .. }
        | VerificationError::QueryMismatch { .. }
        | VerificationError::IdentifierMismatch(_)
        | VerificationError::AudienceMismatch { .. }
        | VerificationError::InvalidProof { .. }
        | VerificationError::ProofExpired { .. }
        | VerificationError::StateTransitionStale { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        VerificationError::KeyNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
        VerificationError::ResolverUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        VerificationError::ResolverTimeout(_) | VerificationError::VerificationTimeout(_) => {
            StatusCode::GATEWAY_TIMEOUT
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.public_message(),
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}
