//! # Proof Engine Contract
//!
//! An engine answers one question: does this proof verify against these
//! public signals under this key. `Ok(false)` means the proof is
//! well-formed but invalid. `Err` means the engine could not evaluate it
//! at all.
//!
//! Verification is CPU-bound and may be slow, so callers run it on a
//! blocking thread with a deadline. Implementations must therefore be
//! `Send + Sync` and must not assume an async runtime.

use thiserror::Error;

use crate::keys::VerificationKey;
use crate::policy::ProofBackend;
use crate::proof::ZkProof;

/// Error evaluating a proof.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The proof object does not have the structure this engine expects.
    #[error("malformed proof: {0}")]
    MalformedProof(String),
    /// The verification key could not be interpreted.
    #[error("unusable verification key for {circuit}: {reason}")]
    MalformedKey {
        /// Circuit the key belongs to.
        circuit: String,
        /// Why the key was rejected.
        reason: String,
    },
}

/// A zero-knowledge proof verification engine.
pub trait ProofEngine: Send + Sync {
    /// The backend family, used for policy enforcement.
    fn backend(&self) -> ProofBackend;

    /// Verify `proof` against `public_signals` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the proof or key cannot be evaluated.
    fn verify(
        &self,
        proof: &ZkProof,
        public_signals: &[String],
        key: &VerificationKey,
    ) -> Result<bool, EngineError>;
}
