//! # Session Store
//!
//! Holds every issued challenge keyed by [`SessionId`]. The store is the
//! only mutable state shared between requests; all access goes through a
//! single `parking_lot::RwLock`, so writers are serialized and readers
//! never observe a partial record.
//!
//! ## Lifecycle
//!
//! ```text
//!            claim            complete
//! Pending ──────────▶ Verifying ─────────▶ Consumed
//!    ▲                   │  │
//!    └──── release ──────┘  └── reject ──▶ Rejected
//! ```
//!
//! A [`SessionClaim`] is the only way out of `Verifying`. Dropping a claim
//! without settling it (for example when the callback connection is
//! cancelled) releases the session back to `Pending`.
//!
//! Consumed and rejected sessions are kept until their TTL elapses so a
//! replayed callback is answered with [`SessionError::AlreadyUsed`] rather
//! than [`SessionError::NotFound`]. Expired sessions are invisible to
//! lookups and are removed by [`SessionStore::purge_expired`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use zkauth_core::{SessionId, Timestamp};
use zkauth_protocol::AuthorizationRequest;

/// Default session lifetime.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(900);

/// Default maximum number of stored sessions.
pub const DEFAULT_SESSION_CAPACITY: usize = 100_000;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Issued, awaiting a callback.
    Pending,
    /// A callback is being verified.
    Verifying,
    /// Verified successfully. Terminal.
    Consumed,
    /// Verification failed through the holder's fault. Terminal.
    Rejected,
}

impl SessionStatus {
    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Verifying => "VERIFYING",
            Self::Consumed => "CONSUMED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Consumed | Self::Rejected)
    }

    /// States reachable from this one.
    pub fn valid_transitions(&self) -> &'static [SessionStatus] {
        match self {
            Self::Pending => &[Self::Verifying],
            Self::Verifying => &[Self::Pending, Self::Consumed, Self::Rejected],
            Self::Consumed | Self::Rejected => &[],
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One issued challenge.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session id; also the request `thid`.
    pub id: SessionId,
    /// The request as issued.
    pub request: Arc<AuthorizationRequest>,
    /// Issue time.
    pub created_at: Timestamp,
    /// Time after which the session no longer exists.
    pub expires_at: Timestamp,
    /// Lifecycle state.
    pub status: SessionStatus,
}

impl Session {
    /// Whether the session has expired at `now`.
    pub fn is_expired(&self, now: &Timestamp) -> bool {
        *now >= self.expires_at
    }
}

/// Session store limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Lifetime of a session from issuance.
    pub ttl: Duration,
    /// Maximum number of stored sessions, expired ones included until
    /// purged.
    pub capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_SESSION_TTL,
            capacity: DEFAULT_SESSION_CAPACITY,
        }
    }
}

/// Errors looking up or claiming a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No live session with this id.
    #[error("session {0} not found")]
    NotFound(SessionId),
    /// Session is not pending.
    #[error("session {id} is {status}")]
    AlreadyUsed {
        /// Session id.
        id: SessionId,
        /// Current state.
        status: SessionStatus,
    },
}

/// Errors storing a new session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A session with this id already exists.
    #[error("session {0} already exists")]
    Duplicate(SessionId),
    /// The store is full of live sessions.
    #[error("session store is at capacity ({0})")]
    CapacityExceeded(usize),
}

/// Thread-safe session store.
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
    config: SessionConfig,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionStore {
    /// Empty store with the given limits.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// The store's limits.
    pub fn config(&self) -> SessionConfig {
        self.config
    }

    /// Store `request` under `id` as a pending session.
    ///
    /// When the store is full, expired sessions are purged before giving
    /// up.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if `id` is in use, or
    /// [`StoreError::CapacityExceeded`] if the store is full of live
    /// sessions.
    pub fn create(&self, id: SessionId, request: AuthorizationRequest) -> Result<Session, StoreError> {
        let now = Timestamp::now();
        let mut sessions = self.sessions.write();

        if sessions.get(&id).is_some_and(|s| !s.is_expired(&now)) {
            return Err(StoreError::Duplicate(id));
        }
        if sessions.len() >= self.config.capacity {
            sessions.retain(|_, s| !s.is_expired(&now));
            if sessions.len() >= self.config.capacity {
                return Err(StoreError::CapacityExceeded(self.config.capacity));
            }
        }

        let session = Session {
            id,
            request: Arc::new(request),
            created_at: now,
            expires_at: now.saturating_add(self.config.ttl),
            status: SessionStatus::Pending,
        };
        sessions.insert(id, session.clone());
        Ok(session)
    }

    /// The live session with this id, in any state.
    pub fn get(&self, id: &SessionId) -> Option<Session> {
        let now = Timestamp::now();
        self.sessions
            .read()
            .get(id)
            .filter(|s| !s.is_expired(&now))
            .cloned()
    }

    /// Remove a session immediately. Returns whether it existed.
    pub fn expire(&self, id: &SessionId) -> bool {
        self.sessions.write().remove(id).is_some()
    }

    /// Move a pending session to `Verifying` and hand out the claim.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for an unknown or expired
    /// session, and [`SessionError::AlreadyUsed`] for any state other than
    /// `Pending`.
    pub fn claim(&self, id: SessionId) -> Result<SessionClaim, SessionError> {
        let now = Timestamp::now();
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&id)
            .filter(|s| !s.is_expired(&now))
            .ok_or(SessionError::NotFound(id))?;
        if session.status != SessionStatus::Pending {
            return Err(SessionError::AlreadyUsed {
                id,
                status: session.status,
            });
        }
        session.status = SessionStatus::Verifying;
        Ok(SessionClaim {
            store: self.clone(),
            session: session.clone(),
            settled: false,
        })
    }

    /// Remove every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Timestamp::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(&now));
        before - sessions.len()
    }

    /// Number of stored sessions, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether the store holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn settle(&self, id: &SessionId, to: SessionStatus) {
        if let Some(session) = self.sessions.write().get_mut(id) {
            if session.status.valid_transitions().contains(&to) {
                session.status = to;
            }
        }
    }
}

/// Exclusive right to verify one session.
///
/// Settle with [`complete`](Self::complete), [`reject`](Self::reject), or
/// [`release`](Self::release). An unsettled claim releases on drop.
#[derive(Debug)]
pub struct SessionClaim {
    store: SessionStore,
    session: Session,
    settled: bool,
}

impl SessionClaim {
    /// The claimed session as it was when claimed.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mark the session consumed.
    pub fn complete(mut self) {
        self.settle(SessionStatus::Consumed);
    }

    /// Mark the session rejected.
    pub fn reject(mut self) {
        self.settle(SessionStatus::Rejected);
    }

    /// Return the session to pending so it can be retried.
    pub fn release(mut self) {
        self.settle(SessionStatus::Pending);
    }

    fn settle(&mut self, to: SessionStatus) {
        self.store.settle(&self.session.id, to);
        self.settled = true;
    }
}

impl Drop for SessionClaim {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(session_id = %self.session.id, "unsettled claim released");
            self.store.settle(&self.session.id, SessionStatus::Pending);
        }
    }
}
