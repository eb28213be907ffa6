//! In-memory identity state history.
//!
//! Mirrors the State contract's bookkeeping: publishing a new root marks
//! the previous latest root as replaced at the publication time.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use zkauth_core::{Did, StateRoot, Timestamp};

use crate::{IdentityState, ResolverError, StateInfo, StateResolver};

/// State resolver backed by a local history map.
#[derive(Debug, Default)]
pub struct InMemoryStateResolver {
    history: RwLock<HashMap<Did, Vec<StateInfo>>>,
}

impl InMemoryStateResolver {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `root` as the latest state of `identity` at `at`.
    pub fn publish(&self, identity: &Did, root: StateRoot, at: Timestamp) {
        let mut history = self.history.write();
        let states = history.entry(identity.clone()).or_default();
        if let Some(latest) = states.last_mut() {
            latest.replaced_at = Some(at);
        }
        states.push(StateInfo {
            state_root: root,
            created_at: at,
            replaced_at: None,
        });
    }
}

#[async_trait]
impl StateResolver for InMemoryStateResolver {
    async fn resolve(&self, identity: &Did) -> Result<IdentityState, ResolverError> {
        self.history
            .read()
            .get(identity)
            .and_then(|states| states.last())
            .map(|latest| IdentityState {
                identifier: identity.clone(),
                state_root: latest.state_root,
                block_timestamp: latest.created_at,
            })
            .ok_or_else(|| ResolverError::IdentityNotFound(identity.clone()))
    }

    async fn resolve_state(
        &self,
        identity: &Did,
        state: &StateRoot,
    ) -> Result<Option<StateInfo>, ResolverError> {
        Ok(self
            .history
            .read()
            .get(identity)
            .and_then(|states| states.iter().find(|s| s.state_root == *state).copied()))
    }
}
