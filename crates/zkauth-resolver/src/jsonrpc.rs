//! # JSON-RPC State Resolver
//!
//! Reads the identity State contract with `eth_call`:
//!
//! | Function | Use |
//! |----------|-----|
//! | `getStateInfoById(uint256)` | latest state of an identity |
//! | `getStateInfoByIdAndState(uint256,uint256)` | history entry of one state |
//!
//! Both return a `StateInfo` tuple of seven `uint256` words: `id, state,
//! replacedByState, createdAtTimestamp, replacedAtTimestamp,
//! createdAtBlock, replacedAtBlock`. The contract reverts for unknown
//! identities and states.
//!
//! The on-chain identity is the base58 identifier of the DID read as a
//! little-endian integer.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use url::Url;
use zkauth_core::{decode_hex, encode_hex, Did, StateRoot, Timestamp};

use crate::config::{redacted_url, ChainEndpoint, ConfigError, ContractAddress};
use crate::identifier::identity_word;
use crate::{IdentityState, ResolverError, StateInfo, StateResolver};

const GET_STATE_INFO_BY_ID: &str = "getStateInfoById(uint256)";
const GET_STATE_INFO_BY_ID_AND_STATE: &str = "getStateInfoByIdAndState(uint256,uint256)";

/// Words in an encoded `StateInfo`.
const STATE_INFO_WORDS: usize = 7;

/// JSON-RPC error code nodes use for `execution reverted`.
const REVERT_CODE: i64 = 3;

/// State resolver for one chain's JSON-RPC node.
#[derive(Debug, Clone)]
pub struct JsonRpcStateResolver {
    http: reqwest::Client,
    rpc_url: Url,
    contract: ContractAddress,
    endpoint: String,
}

#[derive(Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: (CallParams, &'static str),
}

#[derive(Serialize)]
struct CallParams {
    to: String,
    data: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

enum CallOutcome {
    Returned(Vec<u8>),
    Reverted,
}

impl JsonRpcStateResolver {
    /// Resolver for `endpoint` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Client`] if the HTTP client cannot be built.
    pub fn new(endpoint: &ChainEndpoint, timeout: Duration) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        Ok(Self {
            http,
            rpc_url: endpoint.rpc_url.clone(),
            contract: endpoint.contract,
            endpoint: redacted_url(&endpoint.rpc_url),
        })
    }

    async fn eth_call(&self, function: &'static str, args: &[[u8; 32]]) -> Result<CallOutcome, ResolverError> {
        let mut data = selector(function).to_vec();
        for word in args {
            data.extend_from_slice(word);
        }
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "eth_call",
            params: (
                CallParams {
                    to: self.contract.to_string(),
                    data: format!("0x{}", encode_hex(&data)),
                },
                "latest",
            ),
        };

        tracing::debug!(endpoint = %self.endpoint, function, "eth_call");

        let transport = |e: reqwest::Error| {
            if e.is_timeout() {
                ResolverError::Timeout {
                    endpoint: self.endpoint.clone(),
                }
            } else {
                ResolverError::Transport {
                    endpoint: self.endpoint.clone(),
                    source: e,
                }
            }
        };

        let resp = self
            .http
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        if !resp.status().is_success() {
            return Err(ResolverError::InvalidResponse(format!(
                "{} returned HTTP {}",
                self.endpoint,
                resp.status().as_u16()
            )));
        }

        let body: RpcResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                transport(e)
            } else {
                ResolverError::InvalidResponse(e.to_string())
            }
        })?;

        match (body.result, body.error) {
            (_, Some(err)) if err.code == REVERT_CODE || err.message.contains("execution reverted") => {
                tracing::debug!(endpoint = %self.endpoint, function, reason = %err.message, "call reverted");
                Ok(CallOutcome::Reverted)
            }
            (_, Some(err)) => Err(ResolverError::Rpc {
                code: err.code,
                message: err.message,
            }),
            (Some(result), None) => decode_result(&result).map(CallOutcome::Returned),
            (None, None) => Err(ResolverError::InvalidResponse(
                "response has neither result nor error".into(),
            )),
        }
    }
}

#[async_trait]
impl StateResolver for JsonRpcStateResolver {
    async fn resolve(&self, identity: &Did) -> Result<IdentityState, ResolverError> {
        let id = identity_word(identity)?;
        match self.eth_call(GET_STATE_INFO_BY_ID, &[id]).await? {
            CallOutcome::Reverted => Err(ResolverError::IdentityNotFound(identity.clone())),
            CallOutcome::Returned(bytes) => {
                let info = decode_state_info(&bytes, &id)?;
                Ok(IdentityState {
                    identifier: identity.clone(),
                    state_root: info.state_root,
                    block_timestamp: info.created_at,
                })
            }
        }
    }

    async fn resolve_state(
        &self,
        identity: &Did,
        state: &StateRoot,
    ) -> Result<Option<StateInfo>, ResolverError> {
        let id = identity_word(identity)?;
        match self
            .eth_call(GET_STATE_INFO_BY_ID_AND_STATE, &[id, *state.as_bytes()])
            .await?
        {
            CallOutcome::Reverted => Ok(None),
            CallOutcome::Returned(bytes) => decode_state_info(&bytes, &id).map(Some),
        }
    }
}

/// First four bytes of the Keccak-256 of a function signature.
fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn decode_state_info(bytes: &[u8], expected_id: &[u8; 32]) -> Result<StateInfo, ResolverError> {
    if bytes.len() < STATE_INFO_WORDS * 32 {
        return Err(ResolverError::InvalidResponse(format!(
            "StateInfo needs {} bytes, got {}",
            STATE_INFO_WORDS * 32,
            bytes.len()
        )));
    }
    let word = |i: usize| -> [u8; 32] {
        let mut w = [0u8; 32];
        w.copy_from_slice(&bytes[i * 32..(i + 1) * 32]);
        w
    };
    if word(0) != *expected_id {
        return Err(ResolverError::InvalidResponse(
            "StateInfo is for a different identity".into(),
        ));
    }
    let created_at = word_timestamp(&word(3))?;
    let replaced_at = match word_timestamp(&word(4))? {
        t if t.unix_secs() == 0 => None,
        t => Some(t),
    };
    Ok(StateInfo {
        state_root: StateRoot::from_bytes(word(1)),
        created_at,
        replaced_at,
    })
}

fn word_timestamp(word: &[u8; 32]) -> Result<Timestamp, ResolverError> {
    if word[..24].iter().any(|b| *b != 0) {
        return Err(ResolverError::InvalidResponse("timestamp overflows u64".into()));
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[24..]);
    let secs = i64::try_from(u64::from_be_bytes(low))
        .map_err(|_| ResolverError::InvalidResponse("timestamp overflows i64".into()))?;
    Timestamp::from_unix_secs(secs).map_err(|e| ResolverError::InvalidResponse(e.to_string()))
}

fn decode_result(s: &str) -> Result<Vec<u8>, ResolverError> {
    decode_hex(s).map_err(|_| ResolverError::InvalidResponse(format!("result is not hex: {s}")))
}
