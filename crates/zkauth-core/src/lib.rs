#![deny(missing_docs)]

//! # zkauth-core: Foundational Types for the zkauth Verifier
//!
//! This crate defines the types that every other crate in the workspace
//! depends on. It has no internal crate dependencies: only `serde`,
//! `serde_json`, `thiserror`, `chrono`, `uuid`, and `sha2`.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for protocol primitives.** A [`SessionId`] cannot be
//!    passed where a [`Did`] is expected, and a [`StateRoot`] is always
//!    exactly 32 bytes.
//!
//! 2. **[`CanonicalBytes`] is the sole path to digest computation.** Query
//!    hashes and token challenges flow through `CanonicalBytes::new()` or
//!    [`sha256_bytes`], so the verifier and the holder hash identical bytes.
//!
//! 3. **Single [`CircuitId`] enum.** Every circuit the verifier understands is
//!    one variant; unknown circuit strings are rejected at the edge.
//!
//! 4. **[`ValidationError`] hierarchy.** Structured errors with `thiserror`.
//!    No `Box<dyn Error>` and no `.unwrap()` outside tests.

pub mod canonical;
pub mod circuit;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

// Re-export primary types at crate root for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use circuit::CircuitId;
pub use digest::{decode_hex, encode_hex, sha256_bytes, sha256_digest, ContentDigest, StateRoot};
pub use error::{CanonicalizationError, ValidationError};
pub use identity::{Did, SessionId};
pub use temporal::Timestamp;
