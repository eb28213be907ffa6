//! # Verification Keys
//!
//! Keys are looked up by circuit. [`FsKeyLoader`] reads them from a
//! directory laid out as `<dir>/<circuitId>/verification_key.json`.
//! [`PreloadedKeys`] reads every needed key once so a missing key is a
//! startup failure instead of a per-request one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use zkauth_core::CircuitId;

/// File name of a circuit's verification key inside its directory.
pub const VERIFICATION_KEY_FILE: &str = "verification_key.json";

/// Error loading a verification key.
#[derive(Error, Debug)]
pub enum KeyError {
    /// No key exists for the circuit.
    #[error("no verification key for circuit {circuit} at {path}")]
    NotFound {
        /// Circuit whose key is missing.
        circuit: CircuitId,
        /// Where the key was expected.
        path: String,
    },
    /// The key exists but could not be read.
    #[error("failed to read verification key for circuit {circuit}: {source}")]
    Io {
        /// Circuit whose key could not be read.
        circuit: CircuitId,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl KeyError {
    /// The circuit this error concerns.
    pub fn circuit(&self) -> CircuitId {
        match self {
            KeyError::NotFound { circuit, .. } | KeyError::Io { circuit, .. } => *circuit,
        }
    }
}

/// Raw verification key material for one circuit.
///
/// Cloning is cheap; the bytes are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationKey {
    circuit: CircuitId,
    bytes: Arc<[u8]>,
}

impl VerificationKey {
    /// Wrap key bytes for `circuit`.
    pub fn new(circuit: CircuitId, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            circuit,
            bytes: bytes.into(),
        }
    }

    /// Circuit the key verifies.
    pub fn circuit(&self) -> CircuitId {
        self.circuit
    }

    /// Raw key bytes, as read from disk.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Source of verification keys.
pub trait KeyLoader: Send + Sync {
    /// Load the key for `circuit`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::NotFound`] when no key is available.
    fn load(&self, circuit: CircuitId) -> Result<VerificationKey, KeyError>;
}

/// Reads keys from a directory tree on every call.
#[derive(Debug, Clone)]
pub struct FsKeyLoader {
    dir: PathBuf,
}

impl FsKeyLoader {
    /// Loader rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Expected key path for `circuit`.
    pub fn key_path(&self, circuit: CircuitId) -> PathBuf {
        self.dir.join(circuit.as_str()).join(VERIFICATION_KEY_FILE)
    }
}

impl KeyLoader for FsKeyLoader {
    fn load(&self, circuit: CircuitId) -> Result<VerificationKey, KeyError> {
        let path = self.key_path(circuit);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(VerificationKey::new(circuit, bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(KeyError::NotFound {
                circuit,
                path: path.display().to_string(),
            }),
            Err(source) => Err(KeyError::Io { circuit, source }),
        }
    }
}

/// Keys held in memory.
#[derive(Debug, Clone, Default)]
pub struct PreloadedKeys {
    keys: HashMap<CircuitId, VerificationKey>,
}

impl PreloadedKeys {
    /// Load every circuit in `circuits` from `loader`, failing on the
    /// first missing key.
    ///
    /// # Errors
    ///
    /// Returns the first [`KeyError`] encountered.
    pub fn preload(
        loader: &dyn KeyLoader,
        circuits: impl IntoIterator<Item = CircuitId>,
    ) -> Result<Self, KeyError> {
        let mut keys = HashMap::new();
        for circuit in circuits {
            if keys.contains_key(&circuit) {
                continue;
            }
            keys.insert(circuit, loader.load(circuit)?);
        }
        Ok(Self { keys })
    }

    /// Build from keys already in memory.
    pub fn from_keys(keys: impl IntoIterator<Item = VerificationKey>) -> Self {
        Self {
            keys: keys.into_iter().map(|k| (k.circuit(), k)).collect(),
        }
    }

    /// Circuits with a loaded key, sorted.
    pub fn circuits(&self) -> Vec<CircuitId> {
        let mut circuits: Vec<CircuitId> = self.keys.keys().copied().collect();
        circuits.sort();
        circuits
    }
}

impl KeyLoader for PreloadedKeys {
    fn load(&self, circuit: CircuitId) -> Result<VerificationKey, KeyError> {
        self.keys
            .get(&circuit)
            .cloned()
            .ok_or_else(|| KeyError::NotFound {
                circuit,
                path: "<preloaded>".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_key(dir: &Path, circuit: CircuitId, body: &str) {
        let sub = dir.join(circuit.as_str());
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join(VERIFICATION_KEY_FILE), body).unwrap();
    }

    #[test]
    fn fs_loader_reads_circuit_directory() {
        let tmp = tempfile::tempdir().unwrap();
        write_key(tmp.path(), CircuitId::AuthV2, "{\"nPublic\":3}");
        let loader = FsKeyLoader::new(tmp.path());
        let key = loader.load(CircuitId::AuthV2).unwrap();
        assert_eq!(key.circuit(), CircuitId::AuthV2);
        assert_eq!(key.as_bytes(), b"{\"nPublic\":3}");
    }

    #[test]
    fn fs_loader_reports_missing_key() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = FsKeyLoader::new(tmp.path());
        let err = loader.load(CircuitId::AtomicQuerySigV2).unwrap_err();
        assert!(matches!(err, KeyError::NotFound { circuit: CircuitId::AtomicQuerySigV2, .. }));
        assert!(err.to_string().contains("credentialAtomicQuerySigV2"));
    }

    #[test]
    fn preload_fails_fast_on_missing_key() {
        let tmp = tempfile::tempdir().unwrap();
        write_key(tmp.path(), CircuitId::AuthV2, "{}");
        let loader = FsKeyLoader::new(tmp.path());
        let err = PreloadedKeys::preload(
            &loader,
            [CircuitId::AuthV2, CircuitId::AtomicQueryMtpV2],
        )
        .unwrap_err();
        assert_eq!(err.circuit(), CircuitId::AtomicQueryMtpV2);
    }

    #[test]
    fn preloaded_keys_survive_directory_removal() {
        let tmp = tempfile::tempdir().unwrap();
        write_key(tmp.path(), CircuitId::AuthV2, "{}");
        write_key(tmp.path(), CircuitId::AtomicQuerySigV2, "{}");
        let keys = PreloadedKeys::preload(
            &FsKeyLoader::new(tmp.path()),
            [CircuitId::AuthV2, CircuitId::AtomicQuerySigV2, CircuitId::AuthV2],
        )
        .unwrap();
        drop(tmp);
        assert!(keys.load(CircuitId::AuthV2).is_ok());
        assert_eq!(
            keys.circuits(),
            vec![CircuitId::AuthV2, CircuitId::AtomicQuerySigV2]
        );
        assert!(keys.load(CircuitId::AtomicQueryV3).is_err());
    }
}
