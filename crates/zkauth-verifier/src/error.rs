//! # Verification Error Taxonomy
//!
//! Every way a callback can fail. Each kind has a stable machine-readable
//! code and a class:
//!
//! - **Client**: the holder or its token is at fault. The session is
//!   rejected and the holder must start over with a fresh challenge.
//! - **Server**: a collaborator or the deployment failed. The session is
//!   released back to pending so the same callback may be retried.
//!
//! No variant is ever downgraded to a weaker check.

use thiserror::Error;
use zkauth_core::{CircuitId, Did, SessionId};

use crate::session::SessionError;

/// Who is responsible for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Holder-attributable; 4xx.
    Client,
    /// Collaborator or configuration failure; 5xx.
    Server,
}

/// A failed verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// Unknown or expired session.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// Session was already consumed, rejected, or is being verified.
    #[error("session {0} has already been used")]
    SessionAlreadyUsed(SessionId),

    /// Token could not be decoded or does not belong to the session.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// A requested scope entry has no matching proof.
    #[error("no proof for request {request_id} ({circuit})")]
    MissingProof {
        /// Scope entry id.
        request_id: u32,
        /// Requested circuit.
        circuit: CircuitId,
    },

    /// A proof answers a different query than the one requested.
    #[error("proof for request {request_id} does not match the query: {reason}")]
    QueryMismatch {
        /// Scope entry id.
        request_id: u32,
        /// What differed.
        reason: String,
    },

    /// Proofs in the token are bound to different holders.
    #[error("holder identifier mismatch: {0}")]
    IdentifierMismatch(String),

    /// Token is addressed to a different verifier.
    #[error("token addressed to {found}, expected {expected}")]
    AudienceMismatch {
        /// This verifier's audience.
        expected: Did,
        /// Audience found in the token.
        found: Did,
    },

    /// The engine rejected a proof.
    #[error("invalid {circuit} proof: {reason}")]
    InvalidProof {
        /// Circuit.
        circuit: CircuitId,
        /// Engine verdict.
        reason: String,
    },

    /// Proof generation time is outside the accepted window.
    #[error("proof for request {request_id} expired: {reason}")]
    ProofExpired {
        /// Scope entry id.
        request_id: u32,
        /// Age or skew detail.
        reason: String,
    },

    /// An issuer state in the proof is neither current nor recently
    /// replaced.
    #[error("issuer {issuer} state is stale: {reason}")]
    StateTransitionStale {
        /// Issuer DID.
        issuer: Did,
        /// Why the state was refused.
        reason: String,
    },

    /// No verification key for a circuit.
    #[error("verification key for {0} is not available")]
    KeyNotFound(CircuitId),

    /// The state resolver could not answer.
    #[error("state resolver unavailable: {0}")]
    ResolverUnavailable(String),

    /// The state resolver did not answer in time.
    #[error("state resolver timed out for {0}")]
    ResolverTimeout(Did),

    /// The engine did not answer in time.
    #[error("{0} proof verification timed out")]
    VerificationTimeout(CircuitId),
}

impl VerificationError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::SessionAlreadyUsed(_) => "SESSION_ALREADY_USED",
            Self::MalformedToken(_) => "MALFORMED_TOKEN",
            Self::MissingProof { .. } => "MISSING_PROOF",
            Self::QueryMismatch { .. } => "QUERY_MISMATCH",
            Self::IdentifierMismatch(_) => "IDENTIFIER_MISMATCH",
            Self::AudienceMismatch { .. } => "AUDIENCE_MISMATCH",
            Self::InvalidProof { .. } => "INVALID_PROOF",
            Self::ProofExpired { .. } => "PROOF_EXPIRED",
            Self::StateTransitionStale { .. } => "STATE_TRANSITION_STALE",
            Self::KeyNotFound(_) => "KEY_NOT_FOUND",
            Self::ResolverUnavailable(_) => "RESOLVER_UNAVAILABLE",
            Self::ResolverTimeout(_) => "RESOLVER_TIMEOUT",
            Self::VerificationTimeout(_) => "VERIFICATION_TIMEOUT",
        }
    }

    /// Client or server fault.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::KeyNotFound(_)
            | Self::ResolverUnavailable(_)
            | Self::ResolverTimeout(_)
            | Self::VerificationTimeout(_) => ErrorClass::Server,
            _ => ErrorClass::Client,
        }
    }
}

impl From<SessionError> for VerificationError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => Self::SessionNotFound(id),
            SessionError::AlreadyUsed { id, .. } => Self::SessionAlreadyUsed(id),
        }
    }
}
