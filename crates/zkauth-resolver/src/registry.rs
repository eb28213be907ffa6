//! Resolvers keyed by chain prefix.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ChainEndpoint, ConfigError};
use crate::jsonrpc::JsonRpcStateResolver;
use crate::{ResolverError, StateResolver};

/// Immutable-after-startup map from chain prefix to resolver.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<String, Arc<dyn StateResolver>>,
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("chains", &self.prefixes())
            .finish()
    }
}

impl ResolverRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `resolver` for `chain_prefix`, replacing any previous one.
    pub fn with(mut self, chain_prefix: impl Into<String>, resolver: Arc<dyn StateResolver>) -> Self {
        self.resolvers.insert(chain_prefix.into(), resolver);
        self
    }

    /// A JSON-RPC resolver for every endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Client`] if an HTTP client cannot be built.
    pub fn from_endpoints(endpoints: &[ChainEndpoint], timeout: Duration) -> Result<Self, ConfigError> {
        endpoints.iter().try_fold(Self::new(), |registry, endpoint| {
            let resolver = JsonRpcStateResolver::new(endpoint, timeout)?;
            Ok(registry.with(endpoint.chain_prefix.clone(), Arc::new(resolver)))
        })
    }

    /// Resolver for `chain_prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::UnsupportedChain`] when none is registered.
    pub fn get(&self, chain_prefix: &str) -> Result<Arc<dyn StateResolver>, ResolverError> {
        self.resolvers
            .get(chain_prefix)
            .cloned()
            .ok_or_else(|| ResolverError::UnsupportedChain(chain_prefix.to_string()))
    }

    /// Registered prefixes, sorted.
    pub fn prefixes(&self) -> Vec<&str> {
        let mut prefixes: Vec<&str> = self.resolvers.keys().map(String::as_str).collect();
        prefixes.sort_unstable();
        prefixes
    }

    /// Whether no resolver is registered.
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}
