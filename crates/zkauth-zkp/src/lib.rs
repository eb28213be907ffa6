//! # zkauth-zkp: Proof Verification Seam
//!
//! The verifier never implements proof mathematics itself. It hands a
//! proof, its public signals, and the circuit's verification key to a
//! [`ProofEngine`] and acts on the boolean answer.
//!
//! ## Components
//!
//! - [`ZkProof`]: the Groth16-shaped proof object carried on the wire.
//! - [`ProofEngine`]: the engine contract. Production deployments plug in
//!   a real Groth16 verifier; [`DigestEngine`] is a transparent SHA-256
//!   stand-in for development and tests.
//! - [`KeyLoader`]: verification key lookup by circuit, with
//!   [`FsKeyLoader`] reading `<dir>/<circuitId>/verification_key.json`
//!   and [`PreloadedKeys`] holding keys checked at startup.
//! - [`ProofPolicy`]: refuses the digest engine in production mode.

pub mod digest;
pub mod engine;
pub mod keys;
pub mod policy;
pub mod proof;

pub use digest::DigestEngine;
pub use engine::{EngineError, ProofEngine};
pub use keys::{FsKeyLoader, KeyError, KeyLoader, PreloadedKeys, VerificationKey};
pub use policy::{PolicyError, PolicyMode, ProofBackend, ProofPolicy};
pub use proof::ZkProof;
