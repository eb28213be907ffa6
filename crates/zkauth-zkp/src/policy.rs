//! # Proof Backend Policy
//!
//! The digest engine accepts proofs from anyone who can read the
//! verification key. A verifier that runs it in production would accept
//! forged presentations, so every engine is checked against a
//! [`ProofPolicy`] before the service starts.
//!
//! The policy mode is determined by:
//! 1. The `PROOF_POLICY` environment variable (`production` or `development`)
//! 2. Release builds (`not(debug_assertions)`) default to `Production`
//! 3. Debug builds default to `Development`

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable selecting the policy mode.
pub const PROOF_POLICY_ENV: &str = "PROOF_POLICY";

/// Errors from proof policy enforcement.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// Digest engine rejected in production mode.
    #[error("engine rejected: production mode requires a real proof backend ({backend})")]
    InsecureBackend {
        /// The proof backend that was rejected.
        backend: String,
    },
}

/// The family of engine that verifies proofs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofBackend {
    /// SHA-256 digest stand-in. No soundness.
    Digest,
    /// Groth16 SNARK verification.
    Groth16,
}

impl ProofBackend {
    /// Whether this backend provides real cryptographic soundness.
    pub fn is_real(self) -> bool {
        matches!(self, ProofBackend::Groth16)
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            ProofBackend::Digest => "sha256-digest",
            ProofBackend::Groth16 => "groth16",
        }
    }
}

/// Proof policy mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Reject the digest engine unconditionally.
    Production,
    /// Accept any engine. Local development and tests only.
    Development,
}

/// Runtime policy deciding whether an engine may back the verifier.
///
/// ```rust,no_run
/// use zkauth_zkp::policy::{ProofBackend, ProofPolicy};
///
/// let policy = ProofPolicy::production();
/// assert!(policy.validate(ProofBackend::Groth16).is_ok());
/// assert!(policy.validate(ProofBackend::Digest).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofPolicy {
    mode: PolicyMode,
}

impl ProofPolicy {
    /// Create a policy with the given mode.
    pub fn new(mode: PolicyMode) -> Self {
        Self { mode }
    }

    /// Production policy (rejects the digest engine).
    pub fn production() -> Self {
        Self::new(PolicyMode::Production)
    }

    /// Development policy (accepts every engine).
    pub fn development() -> Self {
        Self::new(PolicyMode::Development)
    }

    /// Policy from an explicit setting, falling back to the build default
    /// when the setting is absent or unrecognized.
    pub fn from_setting(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("production" | "prod") => Self::production(),
            Some("development" | "dev") => Self::development(),
            _ => Self::build_default(),
        }
    }

    /// Policy from the `PROOF_POLICY` environment variable.
    pub fn from_environment() -> Self {
        Self::from_setting(std::env::var(PROOF_POLICY_ENV).ok().as_deref())
    }

    /// Release builds default to production, debug builds to development.
    pub fn build_default() -> Self {
        if cfg!(not(debug_assertions)) {
            Self::production()
        } else {
            Self::development()
        }
    }

    /// Check whether `backend` is acceptable under this policy.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InsecureBackend`] for a non-real backend in
    /// production mode.
    pub fn validate(&self, backend: ProofBackend) -> Result<(), PolicyError> {
        match self.mode {
            PolicyMode::Production if !backend.is_real() => Err(PolicyError::InsecureBackend {
                backend: backend.name().to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Current policy mode.
    pub fn mode(&self) -> PolicyMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_rejects_digest() {
        let policy = ProofPolicy::production();
        assert!(policy.validate(ProofBackend::Digest).is_err());
        assert!(policy.validate(ProofBackend::Groth16).is_ok());
    }

    #[test]
    fn development_accepts_everything() {
        let policy = ProofPolicy::development();
        assert!(policy.validate(ProofBackend::Digest).is_ok());
        assert!(policy.validate(ProofBackend::Groth16).is_ok());
    }

    #[test]
    fn settings_are_case_insensitive() {
        assert_eq!(
            ProofPolicy::from_setting(Some("Production")).mode(),
            PolicyMode::Production
        );
        assert_eq!(
            ProofPolicy::from_setting(Some(" dev ")).mode(),
            PolicyMode::Development
        );
    }

    #[test]
    fn unknown_setting_falls_back_to_build_default() {
        assert_eq!(
            ProofPolicy::from_setting(Some("lenient")),
            ProofPolicy::build_default()
        );
        assert_eq!(ProofPolicy::from_setting(None), ProofPolicy::build_default());
    }

    #[test]
    fn release_build_rejects_digest() {
        if cfg!(not(debug_assertions)) {
            assert_eq!(ProofPolicy::build_default().mode(), PolicyMode::Production);
        }
    }

    #[test]
    fn error_message_names_backend() {
        let err = ProofPolicy::production()
            .validate(ProofBackend::Digest)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("sha256-digest"));
        assert!(msg.contains("production mode"));
    }

    #[test]
    fn serde_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&ProofBackend::Groth16).unwrap(), "\"groth16\"");
        assert_eq!(serde_json::to_string(&PolicyMode::Production).unwrap(), "\"production\"");
    }
}
