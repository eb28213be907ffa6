//! # Proof Token Codec
//!
//! A proof token is three base64url segments joined by dots:
//!
//! ```text
//! base64url(header) . base64url(authorization response) . base64url(auth proof)
//! ```
//!
//! The header names the authentication circuit. The payload is the
//! holder's [`AuthorizationResponse`], which carries the per-scope query
//! proofs. The third segment is the authentication proof whose public
//! signals bind the holder DID and a challenge equal to the SHA-256 of
//! the ASCII bytes `header.payload`, so neither of the first two
//! segments can be altered without invalidating it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zkauth_core::{sha256_bytes, CircuitId, ContentDigest};
use zkauth_zkp::ZkProof;

use crate::message::{AuthorizationResponse, AUTHORIZATION_RESPONSE_TYPE, MEDIA_TYPE_ZKP};

/// Proof algorithm named in the token header.
pub const TOKEN_ALGORITHM: &str = "groth16";

/// Header field that every consumer must understand.
pub const CRITICAL_HEADER: &str = "circuitId";

/// Largest token accepted for decoding.
pub const MAX_TOKEN_BYTES: usize = 512 * 1024;

/// Errors decoding or encoding a proof token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token exceeds [`MAX_TOKEN_BYTES`].
    #[error("token is {size} bytes, limit is {max}")]
    TooLarge {
        /// Actual size.
        size: usize,
        /// Limit.
        max: usize,
    },
    /// Token is not UTF-8 text.
    #[error("token is not valid UTF-8")]
    NotUtf8,
    /// Token does not have exactly three segments.
    #[error("expected 3 token segments, found {0}")]
    SegmentCount(usize),
    /// A segment is not valid base64url.
    #[error("{segment} segment is not base64url: {reason}")]
    Encoding {
        /// Segment name.
        segment: &'static str,
        /// Decoder message.
        reason: String,
    },
    /// A segment does not hold the expected JSON structure.
    #[error("{segment} segment is not valid: {reason}")]
    Json {
        /// Segment name.
        segment: &'static str,
        /// Parser message.
        reason: String,
    },
    /// Header algorithm is not supported.
    #[error("unsupported token algorithm \"{0}\"")]
    UnsupportedAlgorithm(String),
    /// Header names a circuit other than the authentication circuit.
    #[error("token header names circuit {0}, expected authV2")]
    UnexpectedCircuit(CircuitId),
    /// Header does not mark `circuitId` as critical.
    #[error("token header does not mark circuitId as critical")]
    MissingCritical,
    /// Header or payload media type is not the proof-token type.
    #[error("unsupported media type \"{0}\"")]
    UnsupportedMediaType(String),
    /// Payload message type is not an authorization response.
    #[error("unexpected message type \"{0}\"")]
    UnexpectedMessageType(String),
    /// A part could not be serialized while encoding.
    #[error("failed to serialize token {segment}: {reason}")]
    Serialization {
        /// Segment name.
        segment: &'static str,
        /// Serializer message.
        reason: String,
    },
}

/// Token header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Proof algorithm.
    pub alg: String,
    /// Authentication circuit.
    #[serde(rename = "circuitId")]
    pub circuit_id: CircuitId,
    /// Critical header fields.
    #[serde(default)]
    pub crit: Vec<String>,
    /// Media type.
    pub typ: String,
}

impl TokenHeader {
    /// The header for an `authV2` Groth16 token.
    pub fn auth_v2() -> Self {
        Self {
            alg: TOKEN_ALGORITHM.to_string(),
            circuit_id: CircuitId::AuthV2,
            crit: vec![CRITICAL_HEADER.to_string()],
            typ: MEDIA_TYPE_ZKP.to_string(),
        }
    }

    fn check(&self) -> Result<(), TokenError> {
        if self.alg != TOKEN_ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm(self.alg.clone()));
        }
        if self.circuit_id != CircuitId::AuthV2 {
            return Err(TokenError::UnexpectedCircuit(self.circuit_id));
        }
        if !self.crit.iter().any(|c| c == CRITICAL_HEADER) {
            return Err(TokenError::MissingCritical);
        }
        if self.typ != MEDIA_TYPE_ZKP {
            return Err(TokenError::UnsupportedMediaType(self.typ.clone()));
        }
        Ok(())
    }
}

/// A proof with its public signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofEnvelope {
    /// The proof.
    pub proof: ZkProof,
    /// Public signals.
    pub pub_signals: Vec<String>,
}

/// Header and payload awaiting the authentication proof.
///
/// Holders build one, prove over [`UnsignedToken::challenge`], then
/// [`seal`](UnsignedToken::seal) it.
#[derive(Debug, Clone)]
pub struct UnsignedToken {
    signing_input: String,
}

impl UnsignedToken {
    /// Encode the first two segments.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Serialization`] if either part fails to
    /// serialize.
    pub fn new(header: &TokenHeader, response: &AuthorizationResponse) -> Result<Self, TokenError> {
        Ok(Self {
            signing_input: format!(
                "{}.{}",
                encode_segment("header", header)?,
                encode_segment("payload", response)?
            ),
        })
    }

    /// Challenge the authentication proof must bind.
    pub fn challenge(&self) -> ContentDigest {
        sha256_bytes(self.signing_input.as_bytes())
    }

    /// Append the authentication proof and return the compact token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Serialization`] if the proof fails to
    /// serialize.
    pub fn seal(self, auth_proof: &ProofEnvelope) -> Result<String, TokenError> {
        Ok(format!(
            "{}.{}",
            self.signing_input,
            encode_segment("proof", auth_proof)?
        ))
    }
}

/// A decoded, structurally valid proof token.
#[derive(Debug, Clone)]
pub struct ProofToken {
    header: TokenHeader,
    response: AuthorizationResponse,
    auth_proof: ProofEnvelope,
    challenge: ContentDigest,
}

impl ProofToken {
    /// Decode raw token bytes as posted to the callback.
    ///
    /// Surrounding whitespace is ignored. Nothing is verified
    /// cryptographically here.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] for any structural problem.
    pub fn decode(raw: &[u8]) -> Result<Self, TokenError> {
        if raw.len() > MAX_TOKEN_BYTES {
            return Err(TokenError::TooLarge {
                size: raw.len(),
                max: MAX_TOKEN_BYTES,
            });
        }
        let text = std::str::from_utf8(raw).map_err(|_| TokenError::NotUtf8)?.trim();

        let segments: Vec<&str> = text.split('.').collect();
        let [header_b64, payload_b64, proof_b64] = segments.as_slice() else {
            return Err(TokenError::SegmentCount(segments.len()));
        };

        let header: TokenHeader = decode_segment("header", header_b64)?;
        header.check()?;

        let response: AuthorizationResponse = decode_segment("payload", payload_b64)?;
        if response.typ != MEDIA_TYPE_ZKP {
            return Err(TokenError::UnsupportedMediaType(response.typ));
        }
        if response.message_type != AUTHORIZATION_RESPONSE_TYPE {
            return Err(TokenError::UnexpectedMessageType(response.message_type));
        }

        let auth_proof: ProofEnvelope = decode_segment("proof", proof_b64)?;
        let challenge = sha256_bytes(format!("{header_b64}.{payload_b64}").as_bytes());

        Ok(Self {
            header,
            response,
            auth_proof,
            challenge,
        })
    }

    /// The header.
    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    /// The holder's authorization response.
    pub fn response(&self) -> &AuthorizationResponse {
        &self.response
    }

    /// The authentication proof.
    pub fn auth_proof(&self) -> &ProofEnvelope {
        &self.auth_proof
    }

    /// SHA-256 of the `header.payload` bytes as received.
    pub fn challenge(&self) -> ContentDigest {
        self.challenge
    }
}

fn encode_segment(segment: &'static str, value: &impl Serialize) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|e| TokenError::Serialization {
        segment,
        reason: e.to_string(),
    })?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_segment<T: DeserializeOwned>(segment: &'static str, b64: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(b64)
        .map_err(|e| TokenError::Encoding {
            segment,
            reason: e.to_string(),
        })?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::Json {
        segment,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkauth_core::{Did, SessionId};

    const VERIFIER: &str = "did:polygonid:polygon:amoy:2qQ68JkRcf3xrHPQPWZei3YeVzHPP58wYNxx2mEouR";
    const HOLDER: &str = "did:polygonid:polygon:amoy:2qFroxB5kwgCxgVrNGUM6EW3khJgCdHHnKTr3VnTcp";

    fn response() -> AuthorizationResponse {
        AuthorizationResponse::new(
            SessionId::new(),
            Did::new(HOLDER).unwrap(),
            Did::new(VERIFIER).unwrap(),
            Vec::new(),
        )
    }

    fn envelope(challenge: ContentDigest) -> ProofEnvelope {
        ProofEnvelope {
            proof: ZkProof {
                pi_a: vec!["1".into()],
                pi_b: Vec::new(),
                pi_c: Vec::new(),
                protocol: "groth16".into(),
                curve: Some("bn128".into()),
            },
            pub_signals: vec![HOLDER.into(), challenge.to_hex()],
        }
    }

    fn sealed() -> (String, ContentDigest, AuthorizationResponse) {
        let response = response();
        let unsigned = UnsignedToken::new(&TokenHeader::auth_v2(), &response).unwrap();
        let challenge = unsigned.challenge();
        (unsigned.seal(&envelope(challenge)).unwrap(), challenge, response)
    }

    fn with_header(header: &TokenHeader) -> String {
        let (token, _, _) = sealed();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[0] = encode_segment("header", header).unwrap();
        parts.join(".")
    }

    #[test]
    fn decode_sealed_token() {
        let (token, challenge, response) = sealed();
        let decoded = ProofToken::decode(token.as_bytes()).unwrap();
        assert_eq!(decoded.header(), &TokenHeader::auth_v2());
        assert_eq!(decoded.response(), &response);
        assert_eq!(decoded.challenge(), challenge);
        assert_eq!(decoded.auth_proof().pub_signals[1], challenge.to_hex());
    }

    #[test]
    fn surrounding_whitespace_ignored() {
        let (token, challenge, _) = sealed();
        let decoded = ProofToken::decode(format!("\n {token}\r\n").as_bytes()).unwrap();
        assert_eq!(decoded.challenge(), challenge);
    }

    #[test]
    fn altered_payload_changes_challenge() {
        let (token, challenge, _) = sealed();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let mut other = response();
        other.body.message = Some("tampered".into());
        parts[1] = encode_segment("payload", &other).unwrap();
        let decoded = ProofToken::decode(parts.join(".").as_bytes()).unwrap();
        assert_ne!(decoded.challenge(), challenge);
    }

    #[test]
    fn wrong_segment_count() {
        assert_eq!(
            ProofToken::decode(b"a.b").unwrap_err(),
            TokenError::SegmentCount(2)
        );
        assert_eq!(
            ProofToken::decode(b"a.b.c.d").unwrap_err(),
            TokenError::SegmentCount(4)
        );
    }

    #[test]
    fn garbage_rejected() {
        assert!(matches!(
            ProofToken::decode(b"!!.??.**"),
            Err(TokenError::Encoding { segment: "header", .. })
        ));
        assert_eq!(ProofToken::decode(&[0xff, 0xfe]).unwrap_err(), TokenError::NotUtf8);
        let not_json = format!("{0}.{0}.{0}", URL_SAFE_NO_PAD.encode(b"plain"));
        assert!(matches!(
            ProofToken::decode(not_json.as_bytes()),
            Err(TokenError::Json { segment: "header", .. })
        ));
    }

    #[test]
    fn oversized_token_rejected() {
        let big = vec![b'a'; MAX_TOKEN_BYTES + 1];
        assert!(matches!(
            ProofToken::decode(&big),
            Err(TokenError::TooLarge { .. })
        ));
    }

    #[test]
    fn header_must_name_auth_circuit() {
        let mut header = TokenHeader::auth_v2();
        header.circuit_id = CircuitId::AtomicQuerySigV2;
        assert_eq!(
            ProofToken::decode(with_header(&header).as_bytes()).unwrap_err(),
            TokenError::UnexpectedCircuit(CircuitId::AtomicQuerySigV2)
        );
    }

    #[test]
    fn header_algorithm_and_crit_checked() {
        let mut header = TokenHeader::auth_v2();
        header.alg = "none".into();
        assert_eq!(
            ProofToken::decode(with_header(&header).as_bytes()).unwrap_err(),
            TokenError::UnsupportedAlgorithm("none".into())
        );

        let mut header = TokenHeader::auth_v2();
        header.crit.clear();
        assert_eq!(
            ProofToken::decode(with_header(&header).as_bytes()).unwrap_err(),
            TokenError::MissingCritical
        );
    }

    #[test]
    fn payload_message_type_checked() {
        let mut other = response();
        other.message_type = "authentication".into();
        let unsigned = UnsignedToken::new(&TokenHeader::auth_v2(), &other).unwrap();
        let challenge = unsigned.challenge();
        let token = unsigned.seal(&envelope(challenge)).unwrap();
        assert_eq!(
            ProofToken::decode(token.as_bytes()).unwrap_err(),
            TokenError::UnexpectedMessageType("authentication".into())
        );
    }
}
