//! # Digest Engine
//!
//! A deterministic, transparent proof engine for development and testing.
//! A "proof" is the SHA-256 of the verification key bytes, a zero
//! separator, and the JSON encoding of the public signals, hex-encoded in
//! `pi_a[0]`.
//!
//! Anyone holding the key can produce valid proofs for any signals, so
//! the engine has no soundness. [`ProofPolicy`](crate::ProofPolicy)
//! rejects it in production mode.

use sha2::{Digest, Sha256};
use zkauth_core::ContentDigest;

use crate::engine::{EngineError, ProofEngine};
use crate::keys::VerificationKey;
use crate::policy::ProofBackend;
use crate::proof::ZkProof;

/// Protocol name written into digest proofs.
pub const DIGEST_PROTOCOL: &str = "sha256-digest";

/// SHA-256 stand-in engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestEngine;

impl DigestEngine {
    /// Produce a proof that [`DigestEngine::verify`] accepts for exactly
    /// these signals under this key.
    pub fn prove(&self, key: &VerificationKey, public_signals: &[String]) -> ZkProof {
        ZkProof {
            pi_a: vec![Self::expected(key, public_signals)],
            pi_b: Vec::new(),
            pi_c: Vec::new(),
            protocol: DIGEST_PROTOCOL.to_string(),
            curve: None,
        }
    }

    fn expected(key: &VerificationKey, public_signals: &[String]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        for signal in public_signals {
            hasher.update(signal.as_bytes());
            hasher.update([0u8]);
        }
        ContentDigest::from_bytes(hasher.finalize().into()).to_hex()
    }
}

impl ProofEngine for DigestEngine {
    fn backend(&self) -> ProofBackend {
        ProofBackend::Digest
    }

    fn verify(
        &self,
        proof: &ZkProof,
        public_signals: &[String],
        key: &VerificationKey,
    ) -> Result<bool, EngineError> {
        if proof.protocol != DIGEST_PROTOCOL {
            return Err(EngineError::MalformedProof(format!(
                "expected protocol {DIGEST_PROTOCOL}, got {}",
                proof.protocol
            )));
        }
        let [digest] = proof.pi_a.as_slice() else {
            return Err(EngineError::MalformedProof(format!(
                "expected one pi_a element, got {}",
                proof.pi_a.len()
            )));
        };
        Ok(*digest == Self::expected(key, public_signals))
    }
}
