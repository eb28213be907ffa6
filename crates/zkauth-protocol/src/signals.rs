//! # Public Signal Layouts
//!
//! Each circuit exposes an ordered array of public signals. The layouts
//! are fixed:
//!
//! | Circuit | Signals |
//! |---------|---------|
//! | `authV2` | `userID, challenge` |
//! | query circuits | `userID, issuerID, issuerState, issuerClaimNonRevState, requestID, queryHash, verifierID, timestamp` |
//!
//! Parsing turns the strings into typed values so the verifier compares
//! identifiers and roots, never raw strings.

use thiserror::Error;
use zkauth_core::{CircuitId, ContentDigest, Did, StateRoot, Timestamp};

/// Number of `authV2` public signals.
pub const AUTH_SIGNAL_COUNT: usize = 2;

/// Number of query-circuit public signals.
pub const QUERY_SIGNAL_COUNT: usize = 8;

/// Errors parsing public signals.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// Wrong number of signals for the circuit.
    #[error("{circuit} expects {expected} public signals, got {actual}")]
    Arity {
        /// Circuit.
        circuit: CircuitId,
        /// Expected count.
        expected: usize,
        /// Actual count.
        actual: usize,
    },
    /// A signal could not be parsed.
    #[error("{circuit} signal {name} is invalid: {reason}")]
    Invalid {
        /// Circuit.
        circuit: CircuitId,
        /// Signal name.
        name: &'static str,
        /// Parse failure.
        reason: String,
    },
    /// The circuit has no query signal layout.
    #[error("{0} is not a query circuit")]
    NotAQueryCircuit(CircuitId),
}

fn field<T, E: std::fmt::Display>(
    circuit: CircuitId,
    name: &'static str,
    raw: &str,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> Result<T, SignalError> {
    parse(raw).map_err(|e| SignalError::Invalid {
        circuit,
        name,
        reason: e.to_string(),
    })
}

fn check_arity(circuit: CircuitId, signals: &[String], expected: usize) -> Result<(), SignalError> {
    if signals.len() != expected {
        return Err(SignalError::Arity {
            circuit,
            expected,
            actual: signals.len(),
        });
    }
    Ok(())
}

/// Public signals of the authentication proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSignals {
    /// Holder DID.
    pub user_id: Did,
    /// Token challenge.
    pub challenge: ContentDigest,
}

impl AuthSignals {
    /// Parse `authV2` signals.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError`] on wrong arity or an unparsable element.
    pub fn parse(signals: &[String]) -> Result<Self, SignalError> {
        let circuit = CircuitId::AuthV2;
        check_arity(circuit, signals, AUTH_SIGNAL_COUNT)?;
        Ok(Self {
            user_id: field(circuit, "userID", &signals[0], |s| Did::new(s))?,
            challenge: field(circuit, "challenge", &signals[1], |s| s.parse::<ContentDigest>())?,
        })
    }

    /// Signals in layout order.
    pub fn to_signals(&self) -> Vec<String> {
        vec![self.user_id.to_string(), self.challenge.to_hex()]
    }
}

/// Public signals of a credential query proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySignals {
    /// Holder DID.
    pub user_id: Did,
    /// Credential issuer DID.
    pub issuer_id: Did,
    /// Issuer state the credential was proven against.
    pub issuer_state: StateRoot,
    /// Issuer state the non-revocation proof was made against.
    pub issuer_claim_non_rev_state: StateRoot,
    /// Scope entry answered.
    pub request_id: u32,
    /// Hash of the query proven.
    pub query_hash: ContentDigest,
    /// Verifier the proof is bound to.
    pub verifier_id: Did,
    /// Proof generation time.
    pub timestamp: Timestamp,
}

impl QuerySignals {
    /// Parse query-circuit signals.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError`] on a non-query circuit, wrong arity, or an
    /// unparsable element.
    pub fn parse(circuit: CircuitId, signals: &[String]) -> Result<Self, SignalError> {
        if !circuit.is_query_circuit() {
            return Err(SignalError::NotAQueryCircuit(circuit));
        }
        check_arity(circuit, signals, QUERY_SIGNAL_COUNT)?;
        Ok(Self {
            user_id: field(circuit, "userID", &signals[0], |s| Did::new(s))?,
            issuer_id: field(circuit, "issuerID", &signals[1], |s| Did::new(s))?,
            issuer_state: field(circuit, "issuerState", &signals[2], |s| s.parse::<StateRoot>())?,
            issuer_claim_non_rev_state: field(
                circuit,
                "issuerClaimNonRevState",
                &signals[3],
                |s| s.parse::<StateRoot>(),
            )?,
            request_id: field(circuit, "requestID", &signals[4], |s| s.parse::<u32>())?,
            query_hash: field(circuit, "queryHash", &signals[5], |s| s.parse::<ContentDigest>())?,
            verifier_id: field(circuit, "verifierID", &signals[6], |s| Did::new(s))?,
            timestamp: field(circuit, "timestamp", &signals[7], |s| {
                s.parse::<i64>()
                    .map_err(|e| e.to_string())
                    .and_then(|secs| Timestamp::from_unix_secs(secs).map_err(|e| e.to_string()))
            })?,
        })
    }

    /// Signals in layout order.
    pub fn to_signals(&self) -> Vec<String> {
        vec![
            self.user_id.to_string(),
            self.issuer_id.to_string(),
            self.issuer_state.to_hex(),
            self.issuer_claim_non_rev_state.to_hex(),
            self.request_id.to_string(),
            self.query_hash.to_hex(),
            self.verifier_id.to_string(),
            self.timestamp.unix_secs().to_string(),
        ]
    }
}
