//! # Canonical Serialization
//!
//! This module defines [`CanonicalBytes`], the sole construction path for
//! bytes used in query-hash computation.
//!
//! ## Security Invariant
//!
//! The holder binds the hash of the requested query into the proof's public
//! signals, and the verifier recomputes it from the stored request. Both
//! sides must hash the same bytes regardless of map insertion order or
//! whitespace, so the inner `Vec<u8>` is private and is only produced by
//! [`CanonicalBytes::new()`].
//!
//! ## Rules
//!
//! 1. Reject floats: predicate operands are integers, strings, or booleans.
//! 2. Sort object keys lexicographically, even if a dependency enables
//!    `serde_json/preserve_order`.
//! 3. Use compact separators (no whitespace).

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS-compatible canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError::FloatRejected`] if the value
    /// contains a non-integer number anywhere in its tree.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = canonicalize(serde_json::to_value(obj)?)?;
        Ok(Self(serde_json::to_vec(&value)?))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume and return the inner byte vector.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn canonicalize(value: Value) -> Result<Value, CanonicalizationError> {
    match value {
        Value::Number(n) if !n.is_i64() && !n.is_u64() => Err(
            CanonicalizationError::FloatRejected(n.as_f64().unwrap_or(f64::NAN)),
        ),
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = serde_json::Map::new();
            for (k, v) in entries {
                sorted.insert(k, canonicalize(v)?);
            }
            Ok(Value::Object(sorted))
        }
        Value::Array(arr) => arr
            .into_iter()
            .map(canonicalize)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_and_compact() {
        let cb = CanonicalBytes::new(&json!({"type": "KYC", "allowedIssuers": ["*"]})).unwrap();
        assert_eq!(
            std::str::from_utf8(cb.as_bytes()).unwrap(),
            r#"{"allowedIssuers":["*"],"type":"KYC"}"#
        );
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a = CanonicalBytes::new(&json!({"a": 1, "b": {"y": 2, "x": 3}})).unwrap();
        let b = CanonicalBytes::new(&json!({"b": {"x": 3, "y": 2}, "a": 1})).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn floats_rejected_at_any_depth() {
        let err = CanonicalBytes::new(&json!({"q": {"$lt": [1, 2.5]}})).unwrap_err();
        assert!(matches!(err, CanonicalizationError::FloatRejected(f) if f == 2.5));
    }

    #[test]
    fn large_integers_accepted() {
        assert!(CanonicalBytes::new(&json!({"v": u64::MAX, "w": i64::MIN})).is_ok());
    }
}
