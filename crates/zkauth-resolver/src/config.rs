//! Resolver endpoint configuration.
//!
//! Endpoints are configured as a comma-separated list of
//! `prefix=rpc_url@contract_address` entries, e.g.
//!
//! ```text
//! polygon:amoy=https://rpc-amoy.polygon.technology@0x1a4cC30f2aA0377b0c3bc9848766D90cb4404124
//! ```
//!
//! RPC URLs often embed API keys, so [`ChainEndpoint`]'s `Debug` output
//! shows only the scheme and host.

use std::str::FromStr;

use url::Url;
use zkauth_core::{decode_hex, encode_hex};

/// A 20-byte contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContractAddress([u8; 20]);

impl ContractAddress {
    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl std::fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", encode_hex(&self.0))
    }
}

impl std::fmt::Debug for ContractAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContractAddress({self})")
    }
}

impl FromStr for ContractAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidContract(s.to_string());
        if !s.starts_with("0x") {
            return Err(invalid());
        }
        let bytes = decode_hex(s).map_err(|_| invalid())?;
        bytes.try_into().map(Self).map_err(|_| invalid())
    }
}

/// One chain's resolver endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct ChainEndpoint {
    /// Chain prefix, `<blockchain>:<network>`.
    pub chain_prefix: String,
    /// JSON-RPC node URL.
    pub rpc_url: Url,
    /// Identity State contract address.
    pub contract: ContractAddress,
}

impl std::fmt::Debug for ChainEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainEndpoint")
            .field("chain_prefix", &self.chain_prefix)
            .field("rpc_url", &redacted_url(&self.rpc_url))
            .field("contract", &self.contract)
            .finish()
    }
}

/// Scheme and host only; paths and credentials often hold API keys.
pub fn redacted_url(url: &Url) -> String {
    match url.host_str() {
        Some(host) => format!("{}://{host}/[REDACTED]", url.scheme()),
        None => "[REDACTED]".to_string(),
    }
}

impl FromStr for ChainEndpoint {
    type Err = ConfigError;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let entry = entry.trim();
        let malformed = || ConfigError::MalformedEntry(redact_entry(entry));

        let (prefix, rest) = entry.split_once('=').ok_or_else(malformed)?;
        // The URL may carry userinfo with its own '@'; the address is last.
        let (rpc, contract) = rest.rsplit_once('@').ok_or_else(malformed)?;

        let prefix = prefix.trim();
        match prefix.split(':').collect::<Vec<_>>().as_slice() {
            [chain, network] if !chain.is_empty() && !network.is_empty() => {}
            _ => return Err(ConfigError::InvalidPrefix(prefix.to_string())),
        }

        let rpc_url = Url::parse(rpc.trim()).map_err(|e| ConfigError::InvalidRpcUrl {
            prefix: prefix.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(rpc_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidRpcUrl {
                prefix: prefix.to_string(),
                reason: format!("unsupported scheme {}", rpc_url.scheme()),
            });
        }

        Ok(Self {
            chain_prefix: prefix.to_string(),
            rpc_url,
            contract: contract.trim().parse()?,
        })
    }
}

fn redact_entry(entry: &str) -> String {
    entry
        .split_once('=')
        .map(|(prefix, _)| format!("{prefix}=[REDACTED]"))
        .unwrap_or_else(|| "[REDACTED]".to_string())
}

/// Parse a comma-separated endpoint list. Blank entries are skipped.
///
/// # Errors
///
/// Returns [`ConfigError`] for a malformed entry or a repeated prefix.
pub fn parse_endpoints(list: &str) -> Result<Vec<ChainEndpoint>, ConfigError> {
    let mut endpoints: Vec<ChainEndpoint> = Vec::new();
    for entry in list.split(',').filter(|e| !e.trim().is_empty()) {
        let endpoint: ChainEndpoint = entry.parse()?;
        if endpoints.iter().any(|e| e.chain_prefix == endpoint.chain_prefix) {
            return Err(ConfigError::DuplicatePrefix(endpoint.chain_prefix));
        }
        endpoints.push(endpoint);
    }
    Ok(endpoints)
}

/// Endpoint configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Entry is not `prefix=rpc_url@contract`.
    #[error("malformed resolver entry \"{0}\" (expected prefix=rpc_url@contract)")]
    MalformedEntry(String),
    /// Prefix is not `<blockchain>:<network>`.
    #[error("invalid chain prefix \"{0}\" (expected <blockchain>:<network>)")]
    InvalidPrefix(String),
    /// RPC URL could not be parsed.
    #[error("invalid RPC URL for {prefix}: {reason}")]
    InvalidRpcUrl {
        /// Chain prefix of the entry.
        prefix: String,
        /// Parse failure.
        reason: String,
    },
    /// Contract address is not 0x-prefixed 20-byte hex.
    #[error("invalid contract address \"{0}\"")]
    InvalidContract(String),
    /// The same prefix appears twice.
    #[error("duplicate resolver for chain \"{0}\"")]
    DuplicatePrefix(String),
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}
