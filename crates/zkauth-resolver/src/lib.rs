//! # zkauth-resolver: Identity State Resolution
//!
//! Issuers anchor their identity state on a blockchain. A proof embeds the
//! issuer state it was generated against; the verifier asks a
//! [`StateResolver`] whether that state is the latest one or, if not, when
//! it was replaced.
//!
//! ## Components
//!
//! - [`StateResolver`]: async contract for one chain.
//! - [`ResolverRegistry`]: resolvers keyed by chain prefix
//!   (`<blockchain>:<network>`, e.g. `polygon:amoy`).
//! - [`JsonRpcStateResolver`]: reads the identity State contract through
//!   `eth_call`.
//! - [`InMemoryStateResolver`]: a local state history for development and
//!   tests.
//! - [`config`]: parsing of `prefix=rpc_url@contract` endpoint lists.
//! - [`identifier`]: the iden3 identifier layout, including genesis states.

pub mod config;
pub mod error;
pub mod identifier;
pub mod jsonrpc;
pub mod memory;
pub mod registry;

pub use config::{parse_endpoints, ChainEndpoint, ConfigError, ContractAddress};
pub use error::ResolverError;
pub use identifier::{genesis_identifier, is_genesis_state};
pub use jsonrpc::JsonRpcStateResolver;
pub use memory::InMemoryStateResolver;
pub use registry::ResolverRegistry;

use async_trait::async_trait;
use zkauth_core::{Did, StateRoot, Timestamp};

/// Latest published state of an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityState {
    /// The identity.
    pub identifier: Did,
    /// Latest state root.
    pub state_root: StateRoot,
    /// Time the latest state was published.
    pub block_timestamp: Timestamp,
}

/// Lifetime of one historical state root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateInfo {
    /// The state root.
    pub state_root: StateRoot,
    /// Time the state was published.
    pub created_at: Timestamp,
    /// Time a newer state replaced it; `None` while it is the latest.
    pub replaced_at: Option<Timestamp>,
}

/// Reads identity state for one chain.
#[async_trait]
pub trait StateResolver: Send + Sync {
    /// Latest state of `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::IdentityNotFound`] if the identity has never
    /// published a state, or a transport error.
    async fn resolve(&self, identity: &Did) -> Result<IdentityState, ResolverError>;

    /// History entry for `state` of `identity`, or `None` if the identity
    /// never published that state.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the chain cannot be read.
    async fn resolve_state(
        &self,
        identity: &Did,
        state: &StateRoot,
    ) -> Result<Option<StateInfo>, ResolverError>;
}
