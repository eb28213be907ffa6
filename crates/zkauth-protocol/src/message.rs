//! # Authorization Messages
//!
//! The verifier sends an [`AuthorizationRequest`] describing what must be
//! proven and where to post the answer. The holder answers with an
//! [`AuthorizationResponse`] carrying one [`ZkProofResponse`] per scope
//! entry, wrapped in a proof token.
//!
//! Both messages share a thread id (`thid`). The verifier sets it to the
//! session id, and the response must echo it back.

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;
use zkauth_core::{CircuitId, Did, SessionId};
use zkauth_zkp::ZkProof;

use crate::query::ProofRequest;

/// Query parameter carrying the session id on the callback URI.
pub const SESSION_ID_PARAM: &str = "sessionId";

/// Media type of unencrypted protocol messages.
pub const MEDIA_TYPE_PLAIN: &str = "application/iden3comm-plain-json";

/// Media type of zero-knowledge proof tokens.
pub const MEDIA_TYPE_ZKP: &str = "application/iden3-zkp-json";

/// Message type of an authorization request.
pub const AUTHORIZATION_REQUEST_TYPE: &str = "authentication";

/// Message type of an authorization response.
pub const AUTHORIZATION_RESPONSE_TYPE: &str = "authentication-response";

/// Append the session id to the callback base URI.
pub fn callback_uri(base: &Url, session_id: SessionId) -> Url {
    let mut uri = base.clone();
    uri.query_pairs_mut()
        .append_pair(SESSION_ID_PARAM, &session_id.to_string());
    uri
}

/// A challenge issued to a holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// Message id.
    pub id: Uuid,
    /// Media type.
    pub typ: String,
    /// Message type, always `authentication`.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Thread id; the session id.
    pub thid: SessionId,
    /// Verifier audience.
    pub from: Did,
    /// Callback URI including the session id.
    pub to: Url,
    /// Request body.
    pub body: AuthorizationRequestBody,
}

/// Body of an [`AuthorizationRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequestBody {
    /// Where the holder posts the proof token.
    pub callback_url: Url,
    /// Human-readable reason shown by the wallet.
    pub reason: String,
    /// Optional message shown by the wallet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Proofs requested. Empty for authentication only.
    pub scope: Vec<ProofRequest>,
}

impl AuthorizationRequest {
    /// Build the request for `session_id`.
    pub fn new(
        session_id: SessionId,
        audience: Did,
        callback_base: &Url,
        reason: impl Into<String>,
        scope: Vec<ProofRequest>,
    ) -> Self {
        let callback = callback_uri(callback_base, session_id);
        Self {
            id: Uuid::new_v4(),
            typ: MEDIA_TYPE_PLAIN.to_string(),
            message_type: AUTHORIZATION_REQUEST_TYPE.to_string(),
            thid: session_id,
            from: audience,
            to: callback.clone(),
            body: AuthorizationRequestBody {
                callback_url: callback,
                reason: reason.into(),
                message: None,
                scope,
            },
        }
    }

    /// Attach a wallet-facing message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.body.message = Some(message.into());
        self
    }

    /// Scope entry with the given id.
    pub fn scope_entry(&self, id: u32) -> Option<&ProofRequest> {
        self.body.scope.iter().find(|r| r.id == id)
    }
}

/// A holder's answer to an [`AuthorizationRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    /// Message id.
    pub id: Uuid,
    /// Media type.
    pub typ: String,
    /// Message type.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Thread id; must equal the request's.
    pub thid: SessionId,
    /// Holder DID.
    pub from: Did,
    /// Verifier audience the response is addressed to.
    pub to: Did,
    /// Response body.
    pub body: AuthorizationResponseBody,
}

/// Body of an [`AuthorizationResponse`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationResponseBody {
    /// Optional message echoed from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// One proof per requested scope entry.
    #[serde(default)]
    pub scope: Vec<ZkProofResponse>,
}

impl AuthorizationResponse {
    /// Build a response on thread `thid`.
    pub fn new(thid: SessionId, holder: Did, audience: Did, scope: Vec<ZkProofResponse>) -> Self {
        Self {
            id: Uuid::new_v4(),
            typ: MEDIA_TYPE_ZKP.to_string(),
            message_type: AUTHORIZATION_RESPONSE_TYPE.to_string(),
            thid,
            from: holder,
            to: audience,
            body: AuthorizationResponseBody {
                message: None,
                scope,
            },
        }
    }
}

/// A proof answering one scope entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkProofResponse {
    /// Id of the scope entry answered.
    pub id: u32,
    /// Circuit used.
    #[serde(rename = "circuitId")]
    pub circuit_id: CircuitId,
    /// The proof.
    pub proof: ZkProof,
    /// Public signals in the circuit's fixed layout.
    pub pub_signals: Vec<String>,
}
