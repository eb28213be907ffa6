//! Resolver errors.

use thiserror::Error;
use zkauth_core::Did;

/// Errors resolving identity state.
#[derive(Error, Debug)]
pub enum ResolverError {
    /// No resolver is registered for the chain prefix.
    #[error("no state resolver for chain \"{0}\"")]
    UnsupportedChain(String),

    /// The identity has no published state.
    #[error("identity {0} has no published state")]
    IdentityNotFound(Did),

    /// The DID does not carry a decodable on-chain identifier.
    #[error("identity {identity} cannot be resolved on chain: {reason}")]
    InvalidIdentifier {
        /// The DID.
        identity: String,
        /// Why it could not be converted.
        reason: String,
    },

    /// The node did not answer in time.
    #[error("state resolver {endpoint} timed out")]
    Timeout {
        /// Node host.
        endpoint: String,
    },

    /// The node could not be reached.
    #[error("state resolver {endpoint} unreachable: {source}")]
    Transport {
        /// Node host.
        endpoint: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The node returned a JSON-RPC error other than a revert.
    #[error("state resolver RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// The node's answer could not be decoded.
    #[error("invalid state resolver response: {0}")]
    InvalidResponse(String),
}

impl ResolverError {
    /// Whether the failure is a deadline rather than an outage.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResolverError::Timeout { .. })
    }
}
