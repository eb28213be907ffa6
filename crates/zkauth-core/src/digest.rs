//! # Digests and State Roots
//!
//! [`ContentDigest`] is a SHA-256 digest used for query hashes and token
//! challenges. [`StateRoot`] is a 32-byte commitment to an identity's
//! published claim set, as anchored on chain.
//!
//! Both serialize as lowercase hex strings; state roots carry a `0x`
//! prefix to match how they appear in public signals and contract calls.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::ValidationError;

/// A SHA-256 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32-byte digest value.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Return the digest as a lowercase hex string (no prefix).
    pub fn to_hex(&self) -> String {
        encode_hex(&self.0)
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ContentDigest {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex32(s).map(Self)
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Compute the SHA-256 digest of canonical bytes.
pub fn sha256_digest(data: &CanonicalBytes) -> ContentDigest {
    sha256_bytes(data.as_bytes())
}

/// Compute the SHA-256 digest of raw bytes.
///
/// Used for token challenges, where the hashed input is the exact byte
/// string the holder signed rather than a JSON value.
pub fn sha256_bytes(data: &[u8]) -> ContentDigest {
    ContentDigest(Sha256::digest(data).into())
}

/// A 32-byte identity state root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateRoot([u8; 32]);

impl StateRoot {
    /// Wrap raw root bytes (big-endian).
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw big-endian root bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", encode_hex(&self.0))
    }
}

impl std::fmt::Display for StateRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for StateRoot {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex32(s).map(Self)
    }
}

impl Serialize for StateRoot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for StateRoot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Lowercase hex of `bytes`, without prefix.
pub fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decode hex, with or without a `0x` prefix.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidHex`] on an odd number of digits or a
/// non-hex character.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidHex {
        value: s.to_string(),
        reason: reason.to_string(),
    };
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid("non-hex character"));
    }
    if digits.len() % 2 != 0 {
        return Err(invalid("odd number of digits"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid("non-hex character")))
        .collect()
}

/// Decode exactly 32 bytes of hex, with or without a `0x` prefix.
fn decode_hex32(s: &str) -> Result<[u8; 32], ValidationError> {
    decode_hex(s)?
        .try_into()
        .map_err(|_| ValidationError::InvalidHex {
            value: s.to_string(),
            reason: "expected 32 bytes".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        let d = sha256_bytes(b"abc");
        assert_eq!(
            d.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn digest_hex_roundtrip() {
        let d = sha256_bytes(b"query");
        let parsed: ContentDigest = d.to_hex().parse().unwrap();
        assert_eq!(d, parsed);
    }

    #[test]
    fn state_root_accepts_optional_prefix() {
        let hex = "11".repeat(32);
        let a: StateRoot = hex.parse().unwrap();
        let b: StateRoot = format!("0x{hex}").parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_hex(), format!("0x{hex}"));
    }

    #[test]
    fn state_root_rejects_bad_input() {
        assert!("0x1234".parse::<StateRoot>().is_err());
        assert!(format!("0x{}", "zz".repeat(32)).parse::<StateRoot>().is_err());
        assert!(format!("0x{}", "é".repeat(32)).parse::<StateRoot>().is_err());
    }

    #[test]
    fn hex_decoding() {
        assert_eq!(decode_hex("0x00ff10").unwrap(), vec![0x00, 0xff, 0x10]);
        assert_eq!(decode_hex("").unwrap(), Vec::<u8>::new());
        assert!(decode_hex("0xabc").is_err());
        assert!(decode_hex("0x+1").is_err());
        assert_eq!(encode_hex(&[0xde, 0xad]), "dead");
    }

    #[test]
    fn state_root_serde_is_prefixed_hex() {
        let root = StateRoot::from_bytes([0xab; 32]);
        let json = serde_json::to_string(&root).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(32)));
        let back: StateRoot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, root);
    }
}
