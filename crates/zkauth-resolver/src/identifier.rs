//! # iden3 Identifiers
//!
//! The last segment of an on-chain DID is the base58 encoding of a 31-byte
//! identifier:
//!
//! ```text
//! | type (2) | genesis (27) | checksum (2) |
//! ```
//!
//! `genesis` is taken from the identity's first state, so an identity that
//! never published a state can still be anchored: its genesis state is
//! implied by the identifier itself. The checksum is the little-endian
//! 16-bit wrapping sum of the preceding 29 bytes.

use zkauth_core::{Did, StateRoot};

use crate::ResolverError;

/// Length of an iden3 identifier in bytes.
pub const IDENTIFIER_LEN: usize = 31;

/// Length of the genesis segment.
const GENESIS_LEN: usize = 27;

/// Length of the type prefix.
const TYPE_LEN: usize = 2;

/// The DID's raw 31-byte identifier.
///
/// # Errors
///
/// Returns [`ResolverError::InvalidIdentifier`] if the last DID segment is
/// not 31 bytes of base58.
pub fn identifier_bytes(identity: &Did) -> Result<[u8; IDENTIFIER_LEN], ResolverError> {
    let invalid = |reason: String| ResolverError::InvalidIdentifier {
        identity: identity.to_string(),
        reason,
    };
    let raw = bs58::decode(identity.id_part())
        .into_vec()
        .map_err(|e| invalid(e.to_string()))?;
    let len = raw.len();
    raw.try_into()
        .map_err(|_| invalid(format!("expected {IDENTIFIER_LEN} bytes, got {len}")))
}

/// The DID's on-chain identity as a big-endian `uint256` word.
///
/// The contract reads the identifier as a little-endian integer.
///
/// # Errors
///
/// Same as [`identifier_bytes`].
pub fn identity_word(identity: &Did) -> Result<[u8; 32], ResolverError> {
    let raw = identifier_bytes(identity)?;
    let mut word = [0u8; 32];
    for (dst, src) in word[32 - IDENTIFIER_LEN..].iter_mut().zip(raw.iter().rev()) {
        *dst = *src;
    }
    Ok(word)
}

/// Whether `state` is the genesis state the DID's identifier was built from.
///
/// # Errors
///
/// Same as [`identifier_bytes`].
pub fn is_genesis_state(identity: &Did, state: &StateRoot) -> Result<bool, ResolverError> {
    let raw = identifier_bytes(identity)?;
    Ok(raw[TYPE_LEN..TYPE_LEN + GENESIS_LEN] == genesis_of(state))
}

/// Base58 identifier of the identity of type `typ` whose genesis state is
/// `state`.
pub fn genesis_identifier(typ: [u8; TYPE_LEN], state: &StateRoot) -> String {
    let mut raw = [0u8; IDENTIFIER_LEN];
    raw[..TYPE_LEN].copy_from_slice(&typ);
    raw[TYPE_LEN..TYPE_LEN + GENESIS_LEN].copy_from_slice(&genesis_of(state));
    let sum = checksum(&raw[..TYPE_LEN + GENESIS_LEN]);
    raw[TYPE_LEN + GENESIS_LEN..].copy_from_slice(&sum);
    bs58::encode(raw).into_string()
}

/// The 27 most significant bytes of the state, little-endian.
fn genesis_of(state: &StateRoot) -> [u8; GENESIS_LEN] {
    let mut genesis = [0u8; GENESIS_LEN];
    for (dst, src) in genesis.iter_mut().zip(state.as_bytes()[..GENESIS_LEN].iter().rev()) {
        *dst = *src;
    }
    genesis
}

fn checksum(bytes: &[u8]) -> [u8; 2] {
    bytes
        .iter()
        .fold(0u16, |sum, b| sum.wrapping_add(u16::from(*b)))
        .to_le_bytes()
}
