//! HTTP tests: drive the router in-process through sign-in and callback.

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::Value;
use tower::ServiceExt;
use url::Url;
use zkauth_api::render::{ChallengeRenderer, RenderError};
use zkauth_api::{app, AppConfig, AppState};
use zkauth_core::{CircuitId, Did, SessionId, StateRoot, Timestamp};
use zkauth_protocol::{
    AuthSignals, AuthorizationRequest, AuthorizationResponse, ProofEnvelope, QuerySignals,
    TokenHeader, UnsignedToken, ZkProofResponse,
};
use zkauth_resolver::{InMemoryStateResolver, ResolverRegistry};
use zkauth_zkp::{DigestEngine, PreloadedKeys, VerificationKey};

const VERIFIER: &str = "did:polygonid:polygon:amoy:2qQ68JkRcf3xrHPQPWZei3YeVzHPP58wYNxx2mEouR";
const HOLDER: &str = "did:polygonid:polygon:amoy:2qFroxB5kwgCxgVrNGUM6EW3khJgCdHHnKTr3VnTcp";
const ISSUER: &str = "did:polygonid:polygon:amoy:2qV9QXdhXXmN5sKjN1YueMjxgRbnJcEGK2kGpvk3cq";

fn did(s: &str) -> Did {
    Did::new(s).unwrap()
}

fn key(circuit: CircuitId) -> VerificationKey {
    VerificationKey::new(circuit, format!("{{\"circuit\":\"{circuit}\"}}").into_bytes())
}

fn config() -> AppConfig {
    AppConfig::new(
        did(VERIFIER),
        Url::parse("https://verifier.example/api/callback").unwrap(),
    )
    .unwrap()
}

fn state_with(resolvers: ResolverRegistry) -> AppState {
    let config = config();
    let keys = PreloadedKeys::from_keys(config.required_circuits().into_iter().map(key));
    AppState::new(config, Arc::new(DigestEngine), Arc::new(keys), resolvers)
}

fn test_state() -> AppState {
    let chain = Arc::new(InMemoryStateResolver::new());
    let published = Timestamp::from_unix_secs(Timestamp::now().unix_secs() - 86_400).unwrap();
    chain.publish(&did(ISSUER), StateRoot::from_bytes([1; 32]), published);
    state_with(ResolverRegistry::new().with("polygon:amoy", chain))
}

fn test_app() -> Router {
    app(test_state())
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

async fn get(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn sign_in(app: &Router) -> AuthorizationRequest {
    let response = get(app, "/api/sign-in").await;
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_str(&body_string(response).await).unwrap()
}

async fn post_callback(app: &Router, uri: &str, token: impl Into<Body>) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header("content-type", "text/plain")
                .body(token.into())
                .unwrap(),
        )
        .await
        .unwrap()
}

/// The path and query of the callback URI carried by `request`.
fn callback_path(request: &AuthorizationRequest) -> String {
    let url = &request.body.callback_url;
    format!("{}?{}", url.path(), url.query().unwrap_or_default())
}

/// A token answering every scope entry of `request` as an honest wallet would.
fn valid_token(request: &AuthorizationRequest) -> String {
    let now = Timestamp::now().unix_secs();
    let scope = request
        .body
        .scope
        .iter()
        .map(|entry| {
            let signals = QuerySignals {
                user_id: did(HOLDER),
                issuer_id: did(ISSUER),
                issuer_state: StateRoot::from_bytes([1; 32]),
                issuer_claim_non_rev_state: StateRoot::from_bytes([1; 32]),
                request_id: entry.id,
                query_hash: entry.query_hash().unwrap(),
                verifier_id: request.from.clone(),
                timestamp: Timestamp::from_unix_secs(now - 30).unwrap(),
            }
            .to_signals();
            ZkProofResponse {
                id: entry.id,
                circuit_id: entry.circuit_id,
                proof: DigestEngine.prove(&key(entry.circuit_id), &signals),
                pub_signals: signals,
            }
        })
        .collect();

    let response = AuthorizationResponse::new(request.thid, did(HOLDER), request.from.clone(), scope);
    let unsigned = UnsignedToken::new(&TokenHeader::auth_v2(), &response).unwrap();
    let pub_signals = AuthSignals {
        user_id: did(HOLDER),
        challenge: unsigned.challenge(),
    }
    .to_signals();
    let proof = DigestEngine.prove(&key(CircuitId::AuthV2), &pub_signals);
    unsigned.seal(&ProofEnvelope { proof, pub_signals }).unwrap()
}

// -- Operational endpoints ----------------------------------------------------

#[tokio::test]
async fn banner_and_probes() {
    let app = test_app();
    assert_eq!(body_string(get(&app, "/").await).await, "Verifier is running!");
    assert_eq!(body_string(get(&app, "/health/liveness").await).await, "ok");

    let ready = get(&app, "/health/readiness").await;
    assert_eq!(ready.status(), StatusCode::OK);
    assert_eq!(body_string(ready).await, "ready");
}

#[tokio::test]
async fn readiness_fails_without_resolvers() {
    let app = app(state_with(ResolverRegistry::new()));
    assert_eq!(
        get(&app, "/health/readiness").await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn openapi_document_served() {
    let response = get(&test_app(), "/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);
    let spec = body_json(response).await;
    assert!(spec["paths"]["/api/sign-in"].is_object());
    assert!(spec["paths"]["/api/callback"]["post"].is_object());
}

#[tokio::test]
async fn metrics_endpoint_without_recorder_is_not_found() {
    assert_eq!(get(&test_app(), "/metrics").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_endpoint_renders_handle() {
    let handle = PrometheusBuilder::new().build_recorder().handle();
    let app = app(test_state().with_metrics(handle));
    let response = get(&app, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}

// -- Sign-in --------------------------------------------------------------------

#[tokio::test]
async fn sign_in_returns_authorization_request() {
    let app = test_app();
    let response = get(&app, "/api/sign-in").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["type"], "authentication");
    assert_eq!(json["from"], VERIFIER);
    assert_eq!(json["body"]["reason"], "test flow");
    assert_eq!(json["body"]["scope"][0]["circuitId"], "credentialAtomicQuerySigV2");
    assert_eq!(json["body"]["scope"][0]["query"]["credentialSubject"]["birthday"]["$lt"], 20000101);

    let thid = json["thid"].as_str().unwrap();
    let callback = json["body"]["callbackUrl"].as_str().unwrap();
    assert!(callback.starts_with("https://verifier.example/api/callback?"));
    assert!(callback.ends_with(&format!("sessionId={thid}")));
}

#[tokio::test]
async fn sign_in_accepts_post_and_issues_distinct_sessions() {
    let state = test_state();
    let app = app(state.clone());
    let first = sign_in(&app).await;
    let second = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/sign-in")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second: AuthorizationRequest = serde_json::from_str(&body_string(second).await).unwrap();

    assert_ne!(first.thid, second.thid);
    assert_eq!(state.sessions().len(), 2);
}

#[derive(Default)]
struct CapturingRenderer {
    rendered: Mutex<Vec<(SessionId, Vec<u8>)>>,
}

impl ChallengeRenderer for CapturingRenderer {
    fn render(&self, session_id: SessionId, payload: &[u8]) -> Result<(), RenderError> {
        self.rendered
            .lock()
            .unwrap()
            .push((session_id, payload.to_vec()));
        Ok(())
    }
}

struct FailingRenderer;

impl ChallengeRenderer for FailingRenderer {
    fn render(&self, _: SessionId, _: &[u8]) -> Result<(), RenderError> {
        Err(RenderError::Io(std::io::Error::other("disk full")))
    }
}

#[tokio::test]
async fn renderer_receives_issued_request_bytes() {
    let renderer = Arc::new(CapturingRenderer::default());
    let app = app(test_state().with_renderer(renderer.clone()));
    let request = sign_in(&app).await;

    // Rendering runs off the request path.
    for _ in 0..50 {
        if !renderer.rendered.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let rendered = renderer.rendered.lock().unwrap();
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].0, request.thid);
    let decoded: AuthorizationRequest = serde_json::from_slice(&rendered[0].1).unwrap();
    assert_eq!(decoded, request);
}

#[tokio::test]
async fn renderer_failure_does_not_affect_issuance() {
    let app = app(test_state().with_renderer(Arc::new(FailingRenderer)));
    let response = get(&app, "/api/sign-in").await;
    assert_eq!(response.status(), StatusCode::OK);
}

// -- Callback -------------------------------------------------------------------

#[tokio::test]
async fn full_handshake_succeeds_once() {
    let app = test_app();
    let request = sign_in(&app).await;
    let token = valid_token(&request);

    let response = post_callback(&app, &callback_path(&request), token.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let result = body_json(response).await;
    assert_eq!(result["sessionId"], request.thid.to_string());
    assert_eq!(result["holder"], HOLDER);
    assert_eq!(result["verifiedScope"][0]["id"], 1);
    assert_eq!(result["verifiedScope"][0]["issuer"], ISSUER);

    let replay = post_callback(&app, &callback_path(&request), token).await;
    assert_eq!(replay.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(replay).await["error"]["code"], "SESSION_ALREADY_USED");
}

#[tokio::test]
async fn callback_requires_session_id() {
    let response = post_callback(&test_app(), "/api/callback", "a.b.c").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "BAD_REQUEST");

    let response = post_callback(&test_app(), "/api/callback?sessionId=not-a-uuid", "a.b.c").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn callback_for_unknown_session_is_not_found() {
    let uri = format!("/api/callback?sessionId={}", SessionId::new());
    let response = post_callback(&test_app(), &uri, "a.b.c").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn garbage_token_is_bad_request() {
    let app = test_app();
    let request = sign_in(&app).await;
    let response = post_callback(&app, &callback_path(&request), "not a token").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "MALFORMED_TOKEN");
}

#[tokio::test]
async fn token_for_other_session_is_rejected() {
    let app = test_app();
    let first = sign_in(&app).await;
    let second = sign_in(&app).await;

    let response = post_callback(&app, &callback_path(&second), valid_token(&first)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "MALFORMED_TOKEN");
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let app = test_app();
    let request = sign_in(&app).await;
    let body = "a".repeat(zkauth_protocol::token::MAX_TOKEN_BYTES + 1);
    let response = post_callback(&app, &callback_path(&request), body).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn resolver_outage_is_generic_service_unavailable() {
    let chain = Arc::new(InMemoryStateResolver::new());
    let app = app(state_with(ResolverRegistry::new().with("polygon:mainnet", chain)));
    let request = sign_in(&app).await;

    let response = post_callback(&app, &callback_path(&request), valid_token(&request)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "RESOLVER_UNAVAILABLE");
    assert_eq!(json["error"]["message"], "Identity state resolver unavailable");
    assert!(json["error"].get("details").is_none());
}

#[tokio::test]
async fn retry_after_outage_succeeds() {
    let state = test_state();
    let app = app(state.clone());
    let request = sign_in(&app).await;
    let token = valid_token(&request);

    // Session stays pending after a server-side failure; a second identical
    // callback against a working deployment sharing the store succeeds.
    let outage = AppState {
        verifier: zkauth_verifier::ProofVerifier::new(
            state.sessions().clone(),
            Arc::new(DigestEngine),
            Arc::new(PreloadedKeys::from_keys(
                state.config.required_circuits().into_iter().map(key),
            )),
            ResolverRegistry::new().with("polygon:mainnet", Arc::new(InMemoryStateResolver::new())),
            zkauth_verifier::VerifierConfig::default(),
        ),
        ..state.clone()
    };
    let failed = post_callback(&zkauth_api::app(outage), &callback_path(&request), token.clone()).await;
    assert_eq!(failed.status(), StatusCode::SERVICE_UNAVAILABLE);

    let retried = post_callback(&app, &callback_path(&request), token).await;
    assert_eq!(retried.status(), StatusCode::OK);
}
