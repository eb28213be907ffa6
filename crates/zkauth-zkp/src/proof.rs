//! # Proof Objects
//!
//! The snarkjs-style proof structure that holders place in each scope
//! response and in the token's authentication segment. Field elements
//! are decimal strings; the verifier treats them as opaque and passes
//! them to the engine unchanged.

use serde::{Deserialize, Serialize};

/// A zero-knowledge proof as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkProof {
    /// First G1 point.
    pub pi_a: Vec<String>,
    /// G2 point.
    #[serde(default)]
    pub pi_b: Vec<Vec<String>>,
    /// Second G1 point.
    #[serde(default)]
    pub pi_c: Vec<String>,
    /// Proof protocol name (`groth16` for production circuits).
    pub protocol: String,
    /// Curve the proof was generated over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
}
