//! # zkauth-protocol: Authentication Handshake Wire Protocol
//!
//! Value types exchanged between the verifier and a holder's wallet.
//! Nothing here performs I/O or cryptography; every type validates its
//! structure at construction or deserialization so downstream code can
//! trust what it holds.
//!
//! - [`query`]: the Query Specification Builder. Typed predicates,
//!   allowed-issuer sets, and [`ProofRequest`] scope entries.
//! - [`message`]: authorization request and response messages.
//! - [`token`]: the compact `header.payload.proof` proof token.
//! - [`signals`]: fixed public-signal layouts per circuit.

pub mod message;
pub mod query;
pub mod signals;
pub mod token;

pub use message::{
    AuthorizationRequest, AuthorizationRequestBody, AuthorizationResponse,
    AuthorizationResponseBody, ZkProofResponse,
};
pub use query::{
    validate_scope, AllowedIssuers, Operand, Operator, Predicate, ProofRequest, Query, QueryError,
    Scalar,
};
pub use signals::{AuthSignals, QuerySignals, SignalError};
pub use token::{ProofEnvelope, ProofToken, TokenError, TokenHeader, UnsignedToken};
