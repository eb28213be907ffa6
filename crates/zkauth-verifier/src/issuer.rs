//! # Challenge Issuer
//!
//! Builds an [`AuthorizationRequest`] for a fresh, unguessable session id
//! and writes it to the [`SessionStore`] before handing it out. A callback
//! can therefore never arrive for a session the store has not seen.

use serde::Serialize;
use thiserror::Error;
use url::Url;
use zkauth_core::{Did, SessionId};
use zkauth_protocol::{validate_scope, AuthorizationRequest, ProofRequest, QueryError};

use crate::session::{SessionStore, StoreError};

/// Errors issuing a challenge.
#[derive(Error, Debug)]
pub enum IssueError {
    /// The scope failed validation.
    #[error("invalid scope: {0}")]
    InvalidScope(#[from] QueryError),
    /// The session could not be stored.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Issue a challenge for `scope` and store it under a new session id.
///
/// # Errors
///
/// Returns [`IssueError::InvalidScope`] if `scope` fails validation and
/// [`IssueError::Store`] if the store refuses the session.
pub fn issue_challenge(
    store: &SessionStore,
    audience: &Did,
    callback_base: &Url,
    reason: &str,
    scope: Vec<ProofRequest>,
) -> Result<(SessionId, AuthorizationRequest), IssueError> {
    validate_scope(&scope)?;
    let session_id = SessionId::new();
    let request = AuthorizationRequest::new(session_id, audience.clone(), callback_base, reason, scope);
    store.create(session_id, request.clone())?;
    tracing::debug!(%session_id, scope = request.body.scope.len(), "challenge stored");
    Ok((session_id, request))
}

/// An issued challenge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedChallenge {
    /// Session id, also embedded in the callback URI.
    pub session_id: SessionId,
    /// The request to present to the holder.
    pub request: AuthorizationRequest,
}

/// [`issue_challenge`] bound to one verifier's audience, callback, and
/// reason.
#[derive(Debug, Clone)]
pub struct ChallengeIssuer {
    store: SessionStore,
    audience: Did,
    callback_base: Url,
    reason: String,
}

impl ChallengeIssuer {
    /// Issuer writing to `store`.
    pub fn new(store: SessionStore, audience: Did, callback_base: Url, reason: impl Into<String>) -> Self {
        Self {
            store,
            audience,
            callback_base,
            reason: reason.into(),
        }
    }

    /// The audience placed in `from`.
    pub fn audience(&self) -> &Did {
        &self.audience
    }

    /// Issue a challenge for `scope`.
    ///
    /// # Errors
    ///
    /// See [`issue_challenge`].
    pub fn issue(&self, scope: Vec<ProofRequest>) -> Result<IssuedChallenge, IssueError> {
        let (session_id, request) = issue_challenge(
            &self.store,
            &self.audience,
            &self.callback_base,
            &self.reason,
            scope,
        )?;
        Ok(IssuedChallenge { session_id, request })
    }
}
