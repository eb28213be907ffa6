//! # Request Subcommand
//!
//! Builds an authorization request offline, exactly as the service would
//! issue it, without storing a session. Useful for checking a scope file
//! or producing a QR code for wallet testing.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use url::Url;
use zkauth_api::render::{qr_svg, DEFAULT_QR_SIZE};
use zkauth_api::state::{default_scope, load_scope, DEFAULT_REASON};
use zkauth_core::{Did, SessionId};
use zkauth_protocol::{validate_scope, AuthorizationRequest};

/// Arguments for the `zkauth request` subcommand.
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Verifier DID placed in `from`.
    #[arg(long)]
    pub verifier_did: Did,

    /// Callback endpoint; `sessionId` is appended.
    #[arg(long)]
    pub callback_url: Url,

    /// Reason shown by the wallet.
    #[arg(long, default_value = DEFAULT_REASON)]
    pub reason: String,

    /// JSON array of proof requests. Defaults to the built-in KYC age query.
    #[arg(long)]
    pub scope_file: Option<PathBuf>,

    /// Also write the request as an SVG QR code to this path.
    #[arg(long)]
    pub qr: Option<PathBuf>,
}

/// Execute the request subcommand.
pub fn run_request(args: &RequestArgs) -> Result<u8> {
    let request = build_request(args)?;
    let json = serde_json::to_string_pretty(&request)?;
    println!("{json}");

    if let Some(path) = &args.qr {
        let svg = qr_svg(&serde_json::to_vec(&request)?, DEFAULT_QR_SIZE)?;
        std::fs::write(path, svg).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), "QR code written");
    }
    Ok(0)
}

/// The request the service would issue for a fresh session.
pub fn build_request(args: &RequestArgs) -> Result<AuthorizationRequest> {
    let scope = match &args.scope_file {
        Some(path) => load_scope(path)?,
        None => default_scope()?,
    };
    validate_scope(&scope)?;
    Ok(AuthorizationRequest::new(
        SessionId::new(),
        args.verifier_did.clone(),
        &args.callback_url,
        args.reason.clone(),
        scope,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RequestArgs {
        RequestArgs {
            verifier_did: Did::new(
                "did:polygonid:polygon:amoy:2qQ68JkRcf3xrHPQPWZei3YeVzHPP58wYNxx2mEouR",
            )
            .unwrap(),
            callback_url: Url::parse("https://verifier.example/api/callback").unwrap(),
            reason: DEFAULT_REASON.to_string(),
            scope_file: None,
            qr: None,
        }
    }

    #[test]
    fn builds_default_request() {
        let request = build_request(&args()).unwrap();
        assert_eq!(request.message_type, "authentication");
        assert_eq!(request.body.scope, default_scope().unwrap());
        assert_eq!(
            request.body.callback_url.query(),
            Some(format!("sessionId={}", request.thid).as_str())
        );
    }

    #[test]
    fn writes_qr_code() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("request.svg");
        let args = RequestArgs {
            qr: Some(path.clone()),
            ..args()
        };
        assert_eq!(run_request(&args).unwrap(), 0);
        let svg = std::fs::read_to_string(path).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn bad_scope_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scope.json");
        std::fs::write(&path, "[{\"id\": 1}]").unwrap();
        let args = RequestArgs {
            scope_file: Some(path),
            ..args()
        };
        assert!(build_request(&args).is_err());
    }
}
