//! Contract tests for `JsonRpcStateResolver` against a mock JSON-RPC node.
//!
//! | Call | Test |
//! |------|------|
//! | `getStateInfoById` | `resolve_*` |
//! | `getStateInfoByIdAndState` | `resolve_state_*` |

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zkauth_core::{encode_hex, Did, StateRoot};
use zkauth_resolver::identifier::identity_word;
use zkauth_resolver::{ChainEndpoint, JsonRpcStateResolver, ResolverError, StateResolver};

const ISSUER: &str = "did:polygonid:polygon:amoy:2qQ68JkRcf3xrHPQPWZei3YeVzHPP58wYNxx2mEouR";
const CONTRACT: &str = "0x1a4cC30f2aA0377b0c3bc9848766D90cb4404124";

fn resolver(server: &MockServer, timeout: Duration) -> JsonRpcStateResolver {
    let endpoint: ChainEndpoint = format!("polygon:amoy={}@{CONTRACT}", server.uri())
        .parse()
        .unwrap();
    JsonRpcStateResolver::new(&endpoint, timeout).unwrap()
}

fn uint(value: u64) -> [u8; 32] {
    let mut w = [0u8; 32];
    w[24..].copy_from_slice(&value.to_be_bytes());
    w
}

fn state_info(id: [u8; 32], state: [u8; 32], created: u64, replaced: u64) -> String {
    let words = [id, state, [0u8; 32], uint(created), uint(replaced), uint(100), uint(0)];
    format!("0x{}", encode_hex(&words.concat()))
}

fn result(value: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": value}))
}

fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": {"code": code, "message": message}
    }))
}

#[tokio::test]
async fn resolve_returns_latest_state() {
    let server = MockServer::start().await;
    let issuer = Did::new(ISSUER).unwrap();
    let id = identity_word(&issuer).unwrap();

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(result(state_info(id, [0x42; 32], 1_700_000_000, 0)))
        .expect(1)
        .mount(&server)
        .await;

    let state = resolver(&server, Duration::from_secs(5))
        .resolve(&issuer)
        .await
        .unwrap();
    assert_eq!(state.identifier, issuer);
    assert_eq!(state.state_root, StateRoot::from_bytes([0x42; 32]));
    assert_eq!(state.block_timestamp.unix_secs(), 1_700_000_000);
}

#[tokio::test]
async fn resolve_sends_eth_call_to_contract() {
    let server = MockServer::start().await;
    let issuer = Did::new(ISSUER).unwrap();
    let id = identity_word(&issuer).unwrap();

    Mock::given(method("POST"))
        .respond_with(result(state_info(id, [1; 32], 1, 0)))
        .mount(&server)
        .await;

    resolver(&server, Duration::from_secs(5))
        .resolve(&issuer)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["method"], "eth_call");
    assert_eq!(body["params"][1], "latest");
    assert_eq!(body["params"][0]["to"], CONTRACT.to_lowercase());

    let data = body["params"][0]["data"].as_str().unwrap();
    let id_hex = encode_hex(&id);
    assert_eq!(data.len(), 2 + 8 + 64);
    assert!(data.ends_with(&id_hex));
}

#[tokio::test]
async fn resolve_unknown_identity_reverts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(rpc_error(3, "execution reverted: Identity does not exist"))
        .mount(&server)
        .await;

    let err = resolver(&server, Duration::from_secs(5))
        .resolve(&Did::new(ISSUER).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverError::IdentityNotFound(_)));
}

#[tokio::test]
async fn resolve_state_returns_replacement_time() {
    let server = MockServer::start().await;
    let issuer = Did::new(ISSUER).unwrap();
    let id = identity_word(&issuer).unwrap();
    Mock::given(method("POST"))
        .respond_with(result(state_info(id, [9; 32], 1_000, 2_000)))
        .mount(&server)
        .await;

    let info = resolver(&server, Duration::from_secs(5))
        .resolve_state(&issuer, &StateRoot::from_bytes([9; 32]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(info.created_at.unix_secs(), 1_000);
    assert_eq!(info.replaced_at.map(|t| t.unix_secs()), Some(2_000));

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["params"][0]["data"].as_str().unwrap().len(), 2 + 8 + 128);
}

#[tokio::test]
async fn resolve_state_unknown_state_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(rpc_error(-32000, "execution reverted: State does not exist"))
        .mount(&server)
        .await;

    let info = resolver(&server, Duration::from_secs(5))
        .resolve_state(&Did::new(ISSUER).unwrap(), &StateRoot::from_bytes([9; 32]))
        .await
        .unwrap();
    assert_eq!(info, None);
}

#[tokio::test]
async fn node_errors_are_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(rpc_error(-32005, "rate limited"))
        .mount(&server)
        .await;

    let err = resolver(&server, Duration::from_secs(5))
        .resolve(&Did::new(ISSUER).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverError::Rpc { code: -32005, .. }));
}

#[tokio::test]
async fn http_failure_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = resolver(&server, Duration::from_secs(5))
        .resolve(&Did::new(ISSUER).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverError::InvalidResponse(_)));
}

#[tokio::test]
async fn mismatched_identity_in_answer_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(result(state_info([5; 32], [1; 32], 1, 0)))
        .mount(&server)
        .await;

    let err = resolver(&server, Duration::from_secs(5))
        .resolve(&Did::new(ISSUER).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverError::InvalidResponse(_)));
}

#[tokio::test]
async fn slow_node_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(result("0x".into()).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = resolver(&server, Duration::from_millis(100))
        .resolve(&Did::new(ISSUER).unwrap())
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "{err}");
}

#[tokio::test]
async fn unreachable_node_is_transport_error() {
    let server = MockServer::start().await;
    let r = resolver(&server, Duration::from_secs(2));
    drop(server);

    let err = r.resolve(&Did::new(ISSUER).unwrap()).await.unwrap_err();
    assert!(matches!(
        err,
        ResolverError::Transport { .. } | ResolverError::Timeout { .. }
    ));
}
