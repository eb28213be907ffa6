//! # Accepted State Delay
//!
//! A proof shows the credential was not revoked as of whatever issuer state
//! the holder's wallet saw. By the time the verifier checks it, the issuer
//! may have published a newer state, possibly one that revokes the
//! credential. A superseded non-revocation state is still accepted if it
//! was replaced no more than the accepted delay before now.

use std::time::Duration;

use zkauth_core::Timestamp;
use zkauth_resolver::StateInfo;

/// Default accepted delay for a superseded non-revocation state.
pub const DEFAULT_ACCEPTED_STATE_DELAY: Duration = Duration::from_secs(300);

/// Decide whether a state that is not the latest is still acceptable.
///
/// `history` is the resolver's record of the embedded state, `None` if the
/// identity never published it. Returns the refusal reason on failure.
pub fn check_transition(history: Option<StateInfo>, now: Timestamp, delay: Duration) -> Result<(), String> {
    let Some(info) = history else {
        return Err("state was never published".to_string());
    };
    let Some(replaced_at) = info.replaced_at else {
        return Ok(());
    };
    let elapsed = now.seconds_since(&replaced_at);
    let allowed = i64::try_from(delay.as_secs()).unwrap_or(i64::MAX);
    if elapsed > allowed {
        return Err(format!(
            "state {} was replaced {elapsed}s ago, accepted delay is {allowed}s",
            info.state_root
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkauth_core::StateRoot;

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_unix_secs(secs).unwrap()
    }

    fn replaced(at: Option<i64>) -> Option<StateInfo> {
        Some(StateInfo {
            state_root: StateRoot::from_bytes([7; 32]),
            created_at: ts(0),
            replaced_at: at.map(ts),
        })
    }

    const DELAY: Duration = DEFAULT_ACCEPTED_STATE_DELAY;

    #[test]
    fn unknown_state_is_stale() {
        assert!(check_transition(None, ts(1_000), DELAY).is_err());
    }

    #[test]
    fn unreplaced_state_is_fresh() {
        assert!(check_transition(replaced(None), ts(1_000_000), DELAY).is_ok());
    }

    #[test]
    fn boundary_is_inclusive() {
        assert!(check_transition(replaced(Some(1_000)), ts(1_300), DELAY).is_ok());
        let err = check_transition(replaced(Some(1_000)), ts(1_301), DELAY).unwrap_err();
        assert!(err.contains("301s"));
    }

    #[test]
    fn zero_delay_accepts_only_same_second() {
        assert!(check_transition(replaced(Some(1_000)), ts(1_000), Duration::ZERO).is_ok());
        assert!(check_transition(replaced(Some(1_000)), ts(1_001), Duration::ZERO).is_err());
    }
}
