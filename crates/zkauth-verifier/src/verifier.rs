//! # Proof Token Verifier
//!
//! Correlates a posted proof token with its session and decides whether
//! the holder proved everything the issued request asked for.
//!
//! ## Pipeline
//!
//! 1. **Claim** the session (`Pending → Verifying`). Unknown or expired
//!    sessions fail with `SessionNotFound`, anything not pending with
//!    `SessionAlreadyUsed`.
//! 2. **Bind**: decode the token, check thread id, audience, the
//!    authentication signals, and match every requested scope entry to
//!    exactly one proof whose public signals name the same request id,
//!    query hash, allowed issuer, holder, and verifier, with a fresh
//!    generation time. Pure; no collaborator is consulted.
//! 3. **Prove**: run the engine over the authentication proof and each
//!    query proof on a blocking thread with a deadline.
//! 4. **Anchor**: the issuer state must exist on chain. The non-revocation
//!    state must be the latest or have been replaced within the accepted
//!    delay. A state the chain never saw passes only as the issuer's
//!    genesis state.
//!
//! The first failure ends the attempt. Client-class failures reject the
//! session; server-class failures release it for a retry. If the future
//! is dropped mid-flight the claim releases the session on drop.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::Instrument;
use zkauth_core::{CircuitId, ContentDigest, Did, SessionId, StateRoot, Timestamp};
use zkauth_protocol::{AuthSignals, ProofRequest, ProofToken, QuerySignals, ZkProofResponse};
use zkauth_resolver::{is_genesis_state, ResolverError, ResolverRegistry, StateResolver};
use zkauth_zkp::{EngineError, KeyLoader, ProofEngine, ZkProof};

use crate::error::{ErrorClass, VerificationError};
use crate::session::{Session, SessionStore};
use crate::staleness::check_transition;

/// Default maximum proof age, one day.
pub const DEFAULT_PROOF_MAX_AGE: Duration = Duration::from_secs(24 * 3600);

/// Default tolerance for proof timestamps ahead of the verifier clock.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Default deadline for one state resolver call.
pub const DEFAULT_RESOLVER_TIMEOUT: Duration = Duration::from_secs(5);

/// Default deadline for one engine call.
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(5);

/// Verifier limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Oldest acceptable proof generation time, relative to now.
    pub proof_max_age: Duration,
    /// How far in the future a proof generation time may be.
    pub clock_skew: Duration,
    /// Deadline for each state resolver call.
    pub resolver_timeout: Duration,
    /// Deadline for each engine call.
    pub engine_timeout: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            proof_max_age: DEFAULT_PROOF_MAX_AGE,
            clock_skew: DEFAULT_CLOCK_SKEW,
            resolver_timeout: DEFAULT_RESOLVER_TIMEOUT,
            engine_timeout: DEFAULT_ENGINE_TIMEOUT,
        }
    }
}

/// A successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Session that was consumed.
    pub session_id: SessionId,
    /// Authenticated holder.
    pub holder: Did,
    /// One entry per requested scope entry, in request order.
    pub verified_scope: Vec<VerifiedProof>,
    /// Verification time.
    pub verified_at: Timestamp,
}

/// Outcome of one verified scope entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedProof {
    /// Scope entry id.
    pub id: u32,
    /// Circuit proven.
    pub circuit_id: CircuitId,
    /// Credential issuer.
    pub issuer: Did,
    /// Hash of the proven query.
    pub query_hash: ContentDigest,
    /// Proof generation time.
    pub proof_timestamp: Timestamp,
}

/// A scope entry matched with its proof and parsed signals.
struct Bound<'a> {
    request: &'a ProofRequest,
    response: &'a ZkProofResponse,
    signals: QuerySignals,
}

/// Verifies proof tokens against stored sessions.
#[derive(Clone)]
pub struct ProofVerifier {
    sessions: SessionStore,
    engine: Arc<dyn ProofEngine>,
    keys: Arc<dyn KeyLoader>,
    resolvers: ResolverRegistry,
    config: VerifierConfig,
}

impl std::fmt::Debug for ProofVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofVerifier")
            .field("backend", &self.engine.backend())
            .field("resolvers", &self.resolvers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProofVerifier {
    /// Verifier over the given collaborators.
    pub fn new(
        sessions: SessionStore,
        engine: Arc<dyn ProofEngine>,
        keys: Arc<dyn KeyLoader>,
        resolvers: ResolverRegistry,
        config: VerifierConfig,
    ) -> Self {
        Self {
            sessions,
            engine,
            keys,
            resolvers,
            config,
        }
    }

    /// The session store tokens are checked against.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The verifier's limits.
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// State resolvers by chain prefix.
    pub fn resolvers(&self) -> &ResolverRegistry {
        &self.resolvers
    }

    /// Verify `raw_token` against session `session_id`.
    ///
    /// On success the session is consumed. A superseded non-revocation
    /// state is accepted if it was replaced at most `accepted_state_delay`
    /// ago.
    ///
    /// # Errors
    ///
    /// Returns the first [`VerificationError`] encountered.
    pub async fn verify(
        &self,
        session_id: SessionId,
        raw_token: &[u8],
        accepted_state_delay: Duration,
    ) -> Result<VerificationResult, VerificationError> {
        let span = tracing::info_span!("verify", %session_id);
        async move {
            let claim = self.sessions.claim(session_id).map_err(|err| {
                tracing::warn!(error = %err, "callback for unavailable session");
                VerificationError::from(err)
            })?;

            let outcome = self
                .run(claim.session(), raw_token, accepted_state_delay)
                .await;

            match &outcome {
                Ok(result) => {
                    tracing::info!(
                        holder = %result.holder,
                        scope = result.verified_scope.len(),
                        "verification succeeded"
                    );
                    claim.complete();
                }
                Err(err) if err.class() == ErrorClass::Client => {
                    tracing::warn!(code = err.code(), error = %err, "verification rejected");
                    claim.reject();
                }
                Err(err) => {
                    tracing::error!(code = err.code(), error = %err, "verification failed, session released");
                    claim.release();
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        session: &Session,
        raw_token: &[u8],
        accepted_state_delay: Duration,
    ) -> Result<VerificationResult, VerificationError> {
        let request = &session.request;
        let now = Timestamp::now();

        let token = ProofToken::decode(raw_token).map_err(malformed)?;
        let response = token.response();
        if response.thid != request.thid {
            return Err(VerificationError::MalformedToken(format!(
                "thread {} does not belong to this session",
                response.thid
            )));
        }
        if response.to != request.from {
            return Err(VerificationError::AudienceMismatch {
                expected: request.from.clone(),
                found: response.to.clone(),
            });
        }

        let holder = &response.from;
        let auth = AuthSignals::parse(&token.auth_proof().pub_signals).map_err(malformed)?;
        if auth.challenge != token.challenge() {
            return Err(VerificationError::InvalidProof {
                circuit: CircuitId::AuthV2,
                reason: "challenge does not match the token".into(),
            });
        }
        if auth.user_id != *holder {
            return Err(VerificationError::IdentifierMismatch(format!(
                "authentication proof is for {}, token is from {holder}",
                auth.user_id
            )));
        }

        let bound = match_scope(&request.body.scope, &response.body.scope)?
            .into_iter()
            .map(|(req, resp)| self.bind(req, resp, holder, &request.from, now))
            .collect::<Result<Vec<_>, _>>()?;

        let auth_proof = token.auth_proof();
        self.check_proof(CircuitId::AuthV2, &auth_proof.proof, &auth_proof.pub_signals)
            .await?;
        for entry in &bound {
            self.check_proof(
                entry.response.circuit_id,
                &entry.response.proof,
                &entry.response.pub_signals,
            )
            .await?;
        }

        for entry in &bound {
            let signals = &entry.signals;
            self.check_issuer_state(&signals.issuer_id, &signals.issuer_state)
                .await?;
            self.check_non_rev_state(
                &signals.issuer_id,
                &signals.issuer_claim_non_rev_state,
                now,
                accepted_state_delay,
            )
            .await?;
        }

        Ok(VerificationResult {
            session_id: session.id,
            holder: holder.clone(),
            verified_scope: bound
                .into_iter()
                .map(|entry| VerifiedProof {
                    id: entry.request.id,
                    circuit_id: entry.request.circuit_id,
                    issuer: entry.signals.issuer_id,
                    query_hash: entry.signals.query_hash,
                    proof_timestamp: entry.signals.timestamp,
                })
                .collect(),
            verified_at: Timestamp::now(),
        })
    }

    /// Check that a proof's public signals answer `request` for `holder`
    /// and `audience`.
    fn bind<'a>(
        &self,
        request: &'a ProofRequest,
        response: &'a ZkProofResponse,
        holder: &Did,
        audience: &Did,
        now: Timestamp,
    ) -> Result<Bound<'a>, VerificationError> {
        let request_id = request.id;
        let mismatch = |reason: String| VerificationError::QueryMismatch { request_id, reason };

        let signals = QuerySignals::parse(response.circuit_id, &response.pub_signals).map_err(malformed)?;
        if signals.request_id != request_id {
            return Err(mismatch(format!("proof answers request {}", signals.request_id)));
        }
        let expected = request.query_hash().map_err(|e| mismatch(e.to_string()))?;
        if signals.query_hash != expected {
            return Err(mismatch("queryHash differs from the requested query".into()));
        }
        if !request.query.allowed_issuers.allows(&signals.issuer_id) {
            return Err(mismatch(format!("issuer {} is not allowed", signals.issuer_id)));
        }
        if signals.user_id != *holder {
            return Err(VerificationError::IdentifierMismatch(format!(
                "proof for request {request_id} is for {}, token is from {holder}",
                signals.user_id
            )));
        }
        if signals.verifier_id != *audience {
            return Err(VerificationError::AudienceMismatch {
                expected: audience.clone(),
                found: signals.verifier_id,
            });
        }

        let age = now.seconds_since(&signals.timestamp);
        let max_age = secs(self.config.proof_max_age);
        let skew = secs(self.config.clock_skew);
        if age > max_age {
            return Err(VerificationError::ProofExpired {
                request_id,
                reason: format!("generated {age}s ago, maximum age is {max_age}s"),
            });
        }
        if age < -skew {
            return Err(VerificationError::ProofExpired {
                request_id,
                reason: format!("generated {}s in the future", -age),
            });
        }

        Ok(Bound {
            request,
            response,
            signals,
        })
    }

    async fn check_proof(
        &self,
        circuit: CircuitId,
        proof: &ZkProof,
        public_signals: &[String],
    ) -> Result<(), VerificationError> {
        let key = self.keys.load(circuit).map_err(|err| {
            tracing::error!(%circuit, error = %err, "verification key unavailable");
            VerificationError::KeyNotFound(circuit)
        })?;

        let engine = Arc::clone(&self.engine);
        let proof = proof.clone();
        let public_signals = public_signals.to_vec();
        let task = tokio::task::spawn_blocking(move || engine.verify(&proof, &public_signals, &key));

        let verdict = match tokio::time::timeout(self.config.engine_timeout, task).await {
            Err(_) => return Err(VerificationError::VerificationTimeout(circuit)),
            Ok(Err(join)) => {
                tracing::error!(%circuit, error = %join, "proof engine task failed");
                return Err(VerificationError::InvalidProof {
                    circuit,
                    reason: "proof could not be evaluated".into(),
                });
            }
            Ok(Ok(verdict)) => verdict,
        };

        match verdict {
            Ok(true) => Ok(()),
            Ok(false) => Err(VerificationError::InvalidProof {
                circuit,
                reason: "proof does not verify".into(),
            }),
            Err(EngineError::MalformedProof(reason)) => {
                Err(VerificationError::InvalidProof { circuit, reason })
            }
            Err(err @ EngineError::MalformedKey { .. }) => {
                tracing::error!(%circuit, error = %err, "verification key rejected by engine");
                Err(VerificationError::KeyNotFound(circuit))
            }
        }
    }

    fn resolver_for(&self, issuer: &Did) -> Result<Arc<dyn StateResolver>, VerificationError> {
        let prefix = issuer.chain_prefix().ok_or_else(|| {
            VerificationError::ResolverUnavailable(format!("issuer {issuer} does not name a chain"))
        })?;
        self.resolvers
            .get(&prefix)
            .map_err(|err| VerificationError::ResolverUnavailable(err.to_string()))
    }

    /// The state the credential was signed against must exist on chain,
    /// however old it is.
    async fn check_issuer_state(&self, issuer: &Did, state: &StateRoot) -> Result<(), VerificationError> {
        let resolver = self.resolver_for(issuer)?;
        match self.bounded(issuer, resolver.resolve_state(issuer, state)).await? {
            Some(_) => Ok(()),
            None => genesis_or_stale(issuer, state),
        }
    }

    /// The non-revocation state must be the latest one, or have been
    /// replaced at most `accepted_state_delay` ago.
    async fn check_non_rev_state(
        &self,
        issuer: &Did,
        state: &StateRoot,
        now: Timestamp,
        accepted_state_delay: Duration,
    ) -> Result<(), VerificationError> {
        let resolver = self.resolver_for(issuer)?;
        match self.deadline(issuer, resolver.resolve(issuer)).await? {
            Ok(latest) if latest.state_root == *state => return Ok(()),
            Ok(_) => {}
            Err(ResolverError::IdentityNotFound(_)) => return genesis_or_stale(issuer, state),
            Err(err) => return Err(resolver_failure(issuer, err)),
        }

        let history = self
            .bounded(issuer, resolver.resolve_state(issuer, state))
            .await?;
        check_transition(history, now, accepted_state_delay).map_err(|reason| {
            VerificationError::StateTransitionStale {
                issuer: issuer.clone(),
                reason,
            }
        })
    }

    /// Run a resolver call under the resolver deadline.
    async fn deadline<T>(
        &self,
        issuer: &Did,
        call: impl Future<Output = Result<T, ResolverError>>,
    ) -> Result<Result<T, ResolverError>, VerificationError> {
        tokio::time::timeout(self.config.resolver_timeout, call)
            .await
            .map_err(|_| VerificationError::ResolverTimeout(issuer.clone()))
    }

    async fn bounded<T>(
        &self,
        issuer: &Did,
        call: impl Future<Output = Result<T, ResolverError>>,
    ) -> Result<T, VerificationError> {
        self.deadline(issuer, call)
            .await?
            .map_err(|err| resolver_failure(issuer, err))
    }
}

/// Accept an unpublished state only if the issuer's identifier was derived
/// from it.
fn genesis_or_stale(issuer: &Did, state: &StateRoot) -> Result<(), VerificationError> {
    match is_genesis_state(issuer, state) {
        Ok(true) => Ok(()),
        Ok(false) => Err(VerificationError::StateTransitionStale {
            issuer: issuer.clone(),
            reason: format!("state {state} is not published and is not the issuer's genesis state"),
        }),
        Err(err) => Err(resolver_failure(issuer, err)),
    }
}

fn resolver_failure(issuer: &Did, err: ResolverError) -> VerificationError {
    match err {
        ResolverError::IdentityNotFound(_) | ResolverError::InvalidIdentifier { .. } => {
            VerificationError::StateTransitionStale {
                issuer: issuer.clone(),
                reason: err.to_string(),
            }
        }
        ResolverError::Timeout { .. } => VerificationError::ResolverTimeout(issuer.clone()),
        other => VerificationError::ResolverUnavailable(other.to_string()),
    }
}

/// Pair each requested scope entry with the proof answering it.
fn match_scope<'a>(
    requested: &'a [ProofRequest],
    answered: &'a [ZkProofResponse],
) -> Result<Vec<(&'a ProofRequest, &'a ZkProofResponse)>, VerificationError> {
    let mut by_id: HashMap<u32, &ZkProofResponse> = HashMap::with_capacity(answered.len());
    for response in answered {
        if by_id.insert(response.id, response).is_some() {
            return Err(VerificationError::MalformedToken(format!(
                "more than one proof for request {}",
                response.id
            )));
        }
    }

    let mut pairs = Vec::with_capacity(requested.len());
    for request in requested {
        match by_id.remove(&request.id) {
            Some(response) if response.circuit_id == request.circuit_id => pairs.push((request, response)),
            _ => {
                return Err(VerificationError::MissingProof {
                    request_id: request.id,
                    circuit: request.circuit_id,
                })
            }
        }
    }

    if let Some(extra) = by_id.keys().min() {
        return Err(VerificationError::QueryMismatch {
            request_id: *extra,
            reason: "no such scope entry was requested".into(),
        });
    }
    Ok(pairs)
}

fn malformed(err: impl std::fmt::Display) -> VerificationError {
    VerificationError::MalformedToken(err.to_string())
}

fn secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}
