//! # zkauth-verifier: Authentication Handshake Core
//!
//! The protocol orchestration between challenge and verified result:
//!
//! - [`session`]: the Session Store. Owns every pending challenge, enforces
//!   TTL and single consumption.
//! - [`issuer`]: the Challenge Issuer. Builds an authorization request for
//!   a fresh session and stores it before returning.
//! - [`verifier`]: the Proof Token Verifier. Correlates a posted token with
//!   its session and runs the verification pipeline.
//! - [`staleness`]: the accepted-delay rule for superseded non-revocation
//!   states.
//! - [`error`]: the verification error taxonomy.
//!
//! ## Control Flow
//!
//! ```text
//! ChallengeIssuer ──create──▶ SessionStore ◀──claim── ProofVerifier
//!                                                        │
//!                                   ProofEngine ◀────────┼────────▶ StateResolver
//! ```

pub mod error;
pub mod issuer;
pub mod session;
pub mod staleness;
pub mod verifier;

pub use error::{ErrorClass, VerificationError};
pub use issuer::{issue_challenge, ChallengeIssuer, IssueError, IssuedChallenge};
pub use session::{
    Session, SessionClaim, SessionConfig, SessionError, SessionStatus, SessionStore, StoreError,
    DEFAULT_SESSION_CAPACITY, DEFAULT_SESSION_TTL,
};
pub use staleness::DEFAULT_ACCEPTED_STATE_DELAY;
pub use verifier::{
    ProofVerifier, VerificationResult, VerifiedProof, VerifierConfig, DEFAULT_CLOCK_SKEW,
    DEFAULT_ENGINE_TIMEOUT, DEFAULT_PROOF_MAX_AGE, DEFAULT_RESOLVER_TIMEOUT,
};
