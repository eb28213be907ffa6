//! # Identity Newtypes
//!
//! Domain-primitive newtypes for the identifiers carried through the
//! authentication handshake.
//!
//! ## Validation
//!
//! [`Did`] validates format at construction time. [`SessionId`] is always
//! valid by construction and is generated from the operating system CSPRNG
//! (UUID v4), so session identifiers embedded in callback URLs cannot be
//! guessed or enumerated.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Correlation token for one issued challenge.
///
/// Serializes as the hyphenated UUID string, which is also the value of the
/// `sessionId` callback query parameter and the message `thid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a session identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ValidationError::InvalidSessionId(s.to_string()))
    }
}

/// A W3C Decentralized Identifier.
///
/// Identity DIDs used on-chain follow the layout
/// `did:<method>:<blockchain>:<network>:<id>`, e.g.
/// `did:polygonid:polygon:amoy:2qQ68JkRcf3xrHPQPWZei3YeVzHPP58wYNxx2mEouR`.
/// The `<blockchain>:<network>` pair is the chain prefix used to select a
/// state resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    /// Create a DID from a string, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDid`] if the string does not
    /// match the `did:method:identifier` format.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        let rest = s
            .strip_prefix("did:")
            .ok_or_else(|| ValidationError::InvalidDid(s.to_string()))?;

        let (method, identifier) = rest
            .split_once(':')
            .ok_or_else(|| ValidationError::InvalidDid(s.to_string()))?;

        // Method must be non-empty and lowercase alphanumeric
        if method.is_empty()
            || !method
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ValidationError::InvalidDid(s.to_string()));
        }

        if identifier.is_empty() || identifier.split(':').any(str::is_empty) {
            return Err(ValidationError::InvalidDid(s.to_string()));
        }

        Ok(())
    }

    /// The full DID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The DID method (`polygonid` in `did:polygonid:...`).
    pub fn method(&self) -> &str {
        self.segments().next().unwrap_or_default()
    }

    /// The chain prefix `<blockchain>:<network>`, present only for DIDs
    /// with the five-segment on-chain layout.
    pub fn chain_prefix(&self) -> Option<String> {
        let parts: Vec<&str> = self.segments().collect();
        match parts.as_slice() {
            [_method, blockchain, network, _id] => Some(format!("{blockchain}:{network}")),
            _ => None,
        }
    }

    /// The method-specific identifier (last segment).
    pub fn id_part(&self) -> &str {
        self.segments().last().unwrap_or_default()
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.0["did:".len()..].split(':')
    }
}

impl std::fmt::Display for Did {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Did {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Did {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERIFIER: &str = "did:polygonid:polygon:amoy:2qQ68JkRcf3xrHPQPWZei3YeVzHPP58wYNxx2mEouR";

    #[test]
    fn session_ids_are_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn session_id_roundtrips_through_display() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn session_id_rejects_counter_values() {
        assert!("1".parse::<SessionId>().is_err());
        assert!("".parse::<SessionId>().is_err());
    }

    #[test]
    fn session_id_serializes_as_plain_string() {
        let id = SessionId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn did_accepts_onchain_layout() {
        let did = Did::new(VERIFIER).unwrap();
        assert_eq!(did.method(), "polygonid");
        assert_eq!(did.chain_prefix().as_deref(), Some("polygon:amoy"));
        assert_eq!(did.id_part(), "2qQ68JkRcf3xrHPQPWZei3YeVzHPP58wYNxx2mEouR");
    }

    #[test]
    fn did_without_chain_segments_has_no_prefix() {
        let did = Did::new("did:web:example.com").unwrap();
        assert_eq!(did.chain_prefix(), None);
        assert_eq!(did.id_part(), "example.com");
    }

    #[test]
    fn did_rejects_malformed_values() {
        for bad in [
            "",
            "did:",
            "did:polygonid",
            "did::abc",
            "did:Polygon:abc",
            "polygonid:polygon:amoy:abc",
            "did:polygonid:polygon::abc",
        ] {
            assert!(Did::new(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn did_deserialization_validates() {
        let ok: Did = serde_json::from_str(&format!("\"{VERIFIER}\"")).unwrap();
        assert_eq!(ok.as_str(), VERIFIER);
        assert!(serde_json::from_str::<Did>("\"not-a-did\"").is_err());
    }
}
