//! # Circuit Identifiers
//!
//! The single enumeration of zero-knowledge circuits the verifier
//! understands. The wire names match the circuit directory names used for
//! verification keys (`<keys>/<circuitId>/verification_key.json`).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A circuit (proof scheme template) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CircuitId {
    /// Holder authentication: proves control of the holder DID and binds
    /// the token challenge.
    #[serde(rename = "authV2")]
    AuthV2,
    /// Credential query against a signature-based (BJJ) credential.
    #[serde(rename = "credentialAtomicQuerySigV2")]
    AtomicQuerySigV2,
    /// Credential query against a Merkle-tree-proof credential.
    #[serde(rename = "credentialAtomicQueryMTPV2")]
    AtomicQueryMtpV2,
    /// Unified credential query circuit (signature or MTP).
    #[serde(rename = "credentialAtomicQueryV3")]
    AtomicQueryV3,
}

impl CircuitId {
    /// All circuits, in declaration order.
    pub const ALL: [CircuitId; 4] = [
        CircuitId::AuthV2,
        CircuitId::AtomicQuerySigV2,
        CircuitId::AtomicQueryMtpV2,
        CircuitId::AtomicQueryV3,
    ];

    /// Wire name of the circuit.
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitId::AuthV2 => "authV2",
            CircuitId::AtomicQuerySigV2 => "credentialAtomicQuerySigV2",
            CircuitId::AtomicQueryMtpV2 => "credentialAtomicQueryMTPV2",
            CircuitId::AtomicQueryV3 => "credentialAtomicQueryV3",
        }
    }

    /// Whether the circuit proves a credential query and may therefore
    /// appear in a request scope.
    pub fn is_query_circuit(self) -> bool {
        !matches!(self, CircuitId::AuthV2)
    }
}

impl std::fmt::Display for CircuitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CircuitId::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownCircuit(s.to_string()))
    }
}
