//! # zkauth-cli: Verifier Operator CLI
//!
//! Offline tooling for operating a zkauth verifier.
//!
//! ## Subcommands
//!
//! - `keys check`: confirm verification keys are present before deploying
//! - `request`: print an authorization request without running the service
//! - `token inspect`: decode a proof token and show what it claims
//!
//! ## Crate Policy
//!
//! - Argument parsing is separated from the work each subcommand does.
//! - Handlers return an exit code; errors propagate with `anyhow`.

pub mod keys;
pub mod request;
pub mod token;
