//! # Session Sweeper
//!
//! Background task that purges expired sessions. Expired sessions are
//! already invisible to lookups; the sweeper only reclaims their memory.

use std::time::Duration;

use tokio::task::JoinHandle;
use zkauth_verifier::SessionStore;

/// Sweep period for a session TTL: a quarter of the TTL, at least one second.
pub fn sweep_interval(ttl: Duration) -> Duration {
    (ttl / 4).max(Duration::from_secs(1))
}

/// Spawn the sweeper on the current runtime.
///
/// The task runs until aborted.
pub fn spawn_sweeper(store: SessionStore, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = store.len(), "expired sessions purged");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_quarter_ttl() {
        assert_eq!(sweep_interval(Duration::from_secs(900)), Duration::from_secs(225));
        assert_eq!(sweep_interval(Duration::from_secs(2)), Duration::from_secs(1));
        assert_eq!(sweep_interval(Duration::ZERO), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn expired_sessions_are_purged() {
        use url::Url;
        use zkauth_core::{Did, SessionId};
        use zkauth_protocol::AuthorizationRequest;
        use zkauth_verifier::SessionConfig;

        let store = SessionStore::new(SessionConfig {
            ttl: Duration::from_millis(20),
            capacity: 10,
        });
        let audience =
            Did::new("did:polygonid:polygon:amoy:2qQ68JkRcf3xrHPQPWZei3YeVzHPP58wYNxx2mEouR").unwrap();
        let callback = Url::parse("https://verifier.example/api/callback").unwrap();
        for _ in 0..3 {
            let id = SessionId::new();
            let request = AuthorizationRequest::new(id, audience.clone(), &callback, "test", Vec::new());
            store.create(id, request).unwrap();
        }
        assert_eq!(store.len(), 3);

        let handle = spawn_sweeper(store.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.abort();
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn sweeper_can_be_aborted() {
        let handle = spawn_sweeper(SessionStore::default(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
