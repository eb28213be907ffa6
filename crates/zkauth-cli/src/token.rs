//! # Token Subcommand
//!
//! Decodes a compact proof token and prints what it claims: header, thread
//! and audience, the holder, and each proof's public signals in named form.
//! Nothing is verified; the output also notes whether the authentication
//! proof's challenge matches the token bytes.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::{json, Value};
use zkauth_protocol::{AuthSignals, ProofToken, QuerySignals, ZkProofResponse};

/// Arguments for the `zkauth token` subcommand.
#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

/// Token subcommands.
#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Decode a token file (`-` for stdin) and print it as JSON.
    Inspect {
        /// Token file.
        path: PathBuf,
    },
}

/// Execute the token subcommand.
pub fn run_token(args: &TokenArgs) -> Result<u8> {
    match &args.command {
        TokenCommand::Inspect { path } => {
            let raw = read_input(path)?;
            let report = inspect(&raw)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(0)
        }
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf).context("reading stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

/// Structured view of a token.
pub fn inspect(raw: &[u8]) -> Result<Value> {
    let token = ProofToken::decode(raw)?;
    let response = token.response();

    let auth = match AuthSignals::parse(&token.auth_proof().pub_signals) {
        Ok(signals) => json!({
            "userID": signals.user_id,
            "challenge": signals.challenge.to_hex(),
            "challengeMatches": signals.challenge == token.challenge(),
        }),
        Err(err) => json!({ "error": err.to_string() }),
    };

    let scope: Vec<Value> = response.body.scope.iter().map(describe_proof).collect();

    Ok(json!({
        "header": token.header(),
        "id": response.id,
        "thid": response.thid,
        "from": response.from,
        "to": response.to,
        "auth": auth,
        "scope": scope,
    }))
}

fn describe_proof(proof: &ZkProofResponse) -> Value {
    let signals = match QuerySignals::parse(proof.circuit_id, &proof.pub_signals) {
        Ok(s) => json!({
            "userID": s.user_id,
            "issuerID": s.issuer_id,
            "issuerState": s.issuer_state.to_string(),
            "issuerClaimNonRevState": s.issuer_claim_non_rev_state.to_string(),
            "requestID": s.request_id,
            "queryHash": s.query_hash.to_hex(),
            "verifierID": s.verifier_id,
            "timestamp": s.timestamp,
        }),
        Err(err) => json!({ "error": err.to_string() }),
    };
    json!({
        "id": proof.id,
        "circuitId": proof.circuit_id,
        "protocol": proof.proof.protocol,
        "signals": signals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkauth_core::{CircuitId, Did, SessionId, StateRoot, Timestamp};
    use zkauth_protocol::{AuthorizationResponse, ProofEnvelope, TokenHeader, UnsignedToken};
    use zkauth_zkp::{DigestEngine, VerificationKey};

    const VERIFIER: &str = "did:polygonid:polygon:amoy:2qQ68JkRcf3xrHPQPWZei3YeVzHPP58wYNxx2mEouR";
    const HOLDER: &str = "did:polygonid:polygon:amoy:2qFroxB5kwgCxgVrNGUM6EW3khJgCdHHnKTr3VnTcp";
    const ISSUER: &str = "did:polygonid:polygon:amoy:2qV9QXdhXXmN5sKjN1YueMjxgRbnJcEGK2kGpvk3cq";

    fn did(s: &str) -> Did {
        Did::new(s).unwrap()
    }

    fn token(thid: SessionId) -> String {
        let key = |c: CircuitId| VerificationKey::new(c, b"{}".to_vec());
        let signals = QuerySignals {
            user_id: did(HOLDER),
            issuer_id: did(ISSUER),
            issuer_state: StateRoot::from_bytes([1; 32]),
            issuer_claim_non_rev_state: StateRoot::from_bytes([2; 32]),
            request_id: 1,
            query_hash: zkauth_core::sha256_bytes(b"query"),
            verifier_id: did(VERIFIER),
            timestamp: Timestamp::from_unix_secs(1_700_000_000).unwrap(),
        }
        .to_signals();
        let proof = ZkProofResponse {
            id: 1,
            circuit_id: CircuitId::AtomicQuerySigV2,
            proof: DigestEngine.prove(&key(CircuitId::AtomicQuerySigV2), &signals),
            pub_signals: signals,
        };
        let response = AuthorizationResponse::new(thid, did(HOLDER), did(VERIFIER), vec![proof]);
        let unsigned = UnsignedToken::new(&TokenHeader::auth_v2(), &response).unwrap();
        let pub_signals = AuthSignals {
            user_id: did(HOLDER),
            challenge: unsigned.challenge(),
        }
        .to_signals();
        let proof = DigestEngine.prove(&key(CircuitId::AuthV2), &pub_signals);
        unsigned.seal(&ProofEnvelope { proof, pub_signals }).unwrap()
    }

    #[test]
    fn inspect_names_signals() {
        let thid = SessionId::new();
        let report = inspect(token(thid).as_bytes()).unwrap();

        assert_eq!(report["thid"], thid.to_string());
        assert_eq!(report["from"], HOLDER);
        assert_eq!(report["to"], VERIFIER);
        assert_eq!(report["header"]["circuitId"], "authV2");
        assert_eq!(report["auth"]["challengeMatches"], true);

        let entry = &report["scope"][0];
        assert_eq!(entry["circuitId"], "credentialAtomicQuerySigV2");
        assert_eq!(entry["signals"]["issuerID"], ISSUER);
        assert_eq!(entry["signals"]["requestID"], 1);
        assert_eq!(entry["signals"]["timestamp"], "2023-11-14T22:13:20Z");
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(inspect(b"not.a.token").is_err());
        assert!(inspect(b"").is_err());
    }

    #[test]
    fn reads_token_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("token.txt");
        std::fs::write(&path, format!("{}\n", token(SessionId::new()))).unwrap();
        let args = TokenArgs {
            command: TokenCommand::Inspect { path },
        };
        assert_eq!(run_token(&args).unwrap(), 0);
    }
}
