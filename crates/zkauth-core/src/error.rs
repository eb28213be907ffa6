//! # Error Hierarchy
//!
//! Validation and canonicalization errors for the foundational types.
//! Each variant carries the rejected input so operators can diagnose
//! misconfiguration without guesswork.

use thiserror::Error;

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Predicate operands and identifiers must be strings or integers.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Validation errors for protocol primitive newtypes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// DID does not conform to W3C DID syntax (did:method:identifier).
    #[error("invalid DID format: \"{0}\" (expected did:<method>:<identifier>)")]
    InvalidDid(String),

    /// Session identifier is not a UUID.
    #[error("invalid session id: \"{0}\"")]
    InvalidSessionId(String),

    /// Circuit identifier is not one the verifier understands.
    #[error("unknown circuit id: \"{0}\"")]
    UnknownCircuit(String),

    /// Hex string is malformed or has the wrong length.
    #[error("invalid hex value: \"{value}\" ({reason})")]
    InvalidHex {
        /// The string that failed to decode.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Timestamp is outside the representable range.
    #[error("invalid timestamp: \"{value}\" ({reason})")]
    InvalidTimestamp {
        /// The value that failed to convert.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_messages_carry_input() {
        let err = ValidationError::InvalidDid("nope".into());
        assert!(err.to_string().contains("nope"));

        let err = ValidationError::InvalidHex {
            value: "0xzz".into(),
            reason: "non-hex character".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("0xzz"));
        assert!(msg.contains("non-hex"));
    }

    #[test]
    fn canonicalization_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = CanonicalizationError::from(serde_err);
        assert!(err.to_string().starts_with("serialization failed"));
    }
}
