//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! Everything here is constructed once at startup from an immutable
//! [`AppConfig`]. The only mutable state is the session store inside the
//! issuer and verifier, which share one [`SessionStore`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use url::Url;
use zkauth_core::{CircuitId, Did};
use zkauth_protocol::{validate_scope, AllowedIssuers, Predicate, ProofRequest, QueryError};
use zkauth_resolver::{parse_endpoints, ChainEndpoint, ResolverRegistry};
use zkauth_verifier::{
    ChallengeIssuer, ProofVerifier, SessionConfig, SessionStore, VerifierConfig,
    DEFAULT_ACCEPTED_STATE_DELAY, DEFAULT_ENGINE_TIMEOUT, DEFAULT_PROOF_MAX_AGE,
    DEFAULT_RESOLVER_TIMEOUT, DEFAULT_SESSION_CAPACITY, DEFAULT_SESSION_TTL,
};
use zkauth_zkp::{KeyLoader, ProofEngine, ProofPolicy};

use crate::render::ChallengeRenderer;

/// Reason shown by the wallet when none is configured.
pub const DEFAULT_REASON: &str = "test flow";

/// Credential type of the built-in sign-in query.
pub const KYC_AGE_CREDENTIAL: &str = "KYCAgeCredential";

/// JSON-LD context of the built-in sign-in query.
pub const KYC_CONTEXT: &str =
    "https://raw.githubusercontent.com/iden3/claim-schema-vocab/main/schemas/json-ld/kyc-v4.jsonld";

/// Configuration errors. Any of these aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    /// A variable could not be parsed.
    #[error("invalid {var}: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Parse failure.
        reason: String,
    },

    /// The sign-in scope file could not be used.
    #[error("sign-in scope {path}: {reason}")]
    Scope {
        /// File path, or `built-in`.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The state resolver list is invalid.
    #[error("STATE_RESOLVERS: {0}")]
    Resolvers(#[from] zkauth_resolver::ConfigError),
}

/// Immutable service configuration.
///
/// Secrets in resolver RPC URLs are redacted by [`ChainEndpoint`]'s
/// `Debug`, so the whole config is safe to log.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Audience placed in `from` of every request.
    pub verifier_did: Did,
    /// Callback endpoint; `sessionId` is appended per challenge.
    pub callback_url: Url,
    /// Wallet-facing reason.
    pub reason: String,
    /// Proofs requested at sign-in.
    pub scope: Vec<ProofRequest>,
    /// Root of `<circuitId>/verification_key.json`.
    pub keys_dir: PathBuf,
    /// State resolver endpoints, one per chain prefix.
    pub resolvers: Vec<ChainEndpoint>,
    /// How long after replacement an issuer state is still accepted.
    pub accepted_state_delay: Duration,
    /// Maximum proof age.
    pub proof_max_age: Duration,
    /// Session lifetime.
    pub session_ttl: Duration,
    /// Maximum stored sessions.
    pub session_capacity: usize,
    /// Deadline for each state resolver call.
    pub resolver_timeout: Duration,
    /// Deadline for each engine call.
    pub engine_timeout: Duration,
    /// Proof backend policy.
    pub proof_policy: ProofPolicy,
    /// Where to write the QR code of the latest challenge, if anywhere.
    pub qr_output_path: Option<PathBuf>,
}

impl AppConfig {
    /// Defaults for everything except the audience and callback.
    pub fn new(verifier_did: Did, callback_url: Url) -> Result<Self, ConfigError> {
        Ok(Self {
            port: 8080,
            verifier_did,
            callback_url,
            reason: DEFAULT_REASON.to_string(),
            scope: default_scope().map_err(|e| ConfigError::Scope {
                path: "built-in".into(),
                reason: e.to_string(),
            })?,
            keys_dir: PathBuf::from("./keys"),
            resolvers: Vec::new(),
            accepted_state_delay: DEFAULT_ACCEPTED_STATE_DELAY,
            proof_max_age: DEFAULT_PROOF_MAX_AGE,
            session_ttl: DEFAULT_SESSION_TTL,
            session_capacity: DEFAULT_SESSION_CAPACITY,
            resolver_timeout: DEFAULT_RESOLVER_TIMEOUT,
            engine_timeout: DEFAULT_ENGINE_TIMEOUT,
            proof_policy: ProofPolicy::build_default(),
            qr_output_path: None,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `VERIFIER_DID` (required)
    /// - `CALLBACK_URL` (required)
    /// - `STATE_RESOLVERS` (required, `prefix=rpc_url@contract,...`)
    /// - `PORT` (default: 8080)
    /// - `SIGN_IN_REASON` (default: `test flow`)
    /// - `SIGN_IN_SCOPE_FILE` (default: built-in KYC age query)
    /// - `KEYS_DIR` (default: `./keys`)
    /// - `ACCEPTED_STATE_DELAY_SECS` (default: 300)
    /// - `PROOF_MAX_AGE_SECS` (default: 86400)
    /// - `SESSION_TTL_SECS` (default: 900)
    /// - `SESSION_CAPACITY` (default: 100000)
    /// - `RESOLVER_TIMEOUT_MS` (default: 5000)
    /// - `ENGINE_TIMEOUT_MS` (default: 5000)
    /// - `PROOF_POLICY` (default: by build profile)
    /// - `QR_OUTPUT_PATH` (default: unset)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let required = |var: &'static str| get(var).ok_or(ConfigError::Missing(var));

        let verifier_did = Did::new(required("VERIFIER_DID")?).map_err(|e| invalid("VERIFIER_DID", e))?;
        let callback_url = parse_callback(&required("CALLBACK_URL")?)?;
        let mut config = Self::new(verifier_did, callback_url)?;

        config.resolvers = parse_endpoints(&required("STATE_RESOLVERS")?)?;
        if config.resolvers.is_empty() {
            return Err(ConfigError::Missing("STATE_RESOLVERS"));
        }
        if let Some(port) = get("PORT") {
            config.port = port.trim().parse().map_err(|e| invalid("PORT", e))?;
        }
        if let Some(reason) = get("SIGN_IN_REASON") {
            config.reason = reason;
        }
        if let Some(path) = get("SIGN_IN_SCOPE_FILE") {
            config.scope = load_scope(Path::new(&path))?;
        }
        if let Some(dir) = get("KEYS_DIR") {
            config.keys_dir = PathBuf::from(dir);
        }
        if let Some(v) = get("ACCEPTED_STATE_DELAY_SECS") {
            config.accepted_state_delay = seconds("ACCEPTED_STATE_DELAY_SECS", &v)?;
        }
        if let Some(v) = get("PROOF_MAX_AGE_SECS") {
            config.proof_max_age = seconds("PROOF_MAX_AGE_SECS", &v)?;
        }
        if let Some(v) = get("SESSION_TTL_SECS") {
            config.session_ttl = seconds("SESSION_TTL_SECS", &v)?;
            if config.session_ttl.is_zero() {
                return Err(invalid("SESSION_TTL_SECS", "must be positive"));
            }
        }
        if let Some(v) = get("SESSION_CAPACITY") {
            config.session_capacity = v.trim().parse().map_err(|e| invalid("SESSION_CAPACITY", e))?;
            if config.session_capacity == 0 {
                return Err(invalid("SESSION_CAPACITY", "must be positive"));
            }
        }
        if let Some(v) = get("RESOLVER_TIMEOUT_MS") {
            config.resolver_timeout = millis("RESOLVER_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("ENGINE_TIMEOUT_MS") {
            config.engine_timeout = millis("ENGINE_TIMEOUT_MS", &v)?;
        }
        config.proof_policy = ProofPolicy::from_setting(get("PROOF_POLICY").as_deref());
        config.qr_output_path = get("QR_OUTPUT_PATH").map(PathBuf::from);

        Ok(config)
    }

    /// Every circuit a callback may need a key for: `authV2` plus each
    /// circuit in the sign-in scope.
    pub fn required_circuits(&self) -> Vec<CircuitId> {
        let mut circuits = vec![CircuitId::AuthV2];
        for request in &self.scope {
            if !circuits.contains(&request.circuit_id) {
                circuits.push(request.circuit_id);
            }
        }
        circuits
    }
}

/// The built-in sign-in scope: holder born before 2000-01-01, any issuer.
pub fn default_scope() -> Result<Vec<ProofRequest>, QueryError> {
    Ok(vec![ProofRequest::build(
        1,
        CircuitId::AtomicQuerySigV2,
        AllowedIssuers::Any,
        KYC_AGE_CREDENTIAL,
        KYC_CONTEXT,
        [("birthday", Predicate::less_than(20000101))],
    )?])
}

/// Read and validate a JSON array of proof requests.
pub fn load_scope(path: &Path) -> Result<Vec<ProofRequest>, ConfigError> {
    let scope_error = |reason: String| ConfigError::Scope {
        path: path.display().to_string(),
        reason,
    };
    let bytes = std::fs::read(path).map_err(|e| scope_error(e.to_string()))?;
    let scope: Vec<ProofRequest> = serde_json::from_slice(&bytes).map_err(|e| scope_error(e.to_string()))?;
    validate_scope(&scope).map_err(|e| scope_error(e.to_string()))?;
    Ok(scope)
}

fn parse_callback(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| invalid("CALLBACK_URL", e))?;
    if !matches!(url.scheme(), "https" | "http") || url.host_str().is_none() {
        return Err(invalid("CALLBACK_URL", "must be an absolute http(s) URL"));
    }
    Ok(url)
}

fn seconds(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse()
        .map(Duration::from_secs)
        .map_err(|e| invalid(var, e))
}

fn millis(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let value: u64 = raw.trim().parse().map_err(|e| invalid(var, e))?;
    if value == 0 {
        return Err(invalid(var, "must be positive"));
    }
    Ok(Duration::from_millis(value))
}

fn invalid(var: &'static str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.to_string(),
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Startup configuration.
    pub config: Arc<AppConfig>,
    /// Issues challenges into the session store.
    pub issuer: ChallengeIssuer,
    /// Verifies callbacks against the session store.
    pub verifier: ProofVerifier,
    /// Optional challenge renderer.
    pub renderer: Option<Arc<dyn ChallengeRenderer>>,
    /// Prometheus handle backing `/metrics`, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("verifier", &self.verifier)
            .field("renderer", &self.renderer.is_some())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl AppState {
    /// Wire the issuer and verifier around one session store.
    pub fn new(
        config: AppConfig,
        engine: Arc<dyn ProofEngine>,
        keys: Arc<dyn KeyLoader>,
        resolvers: ResolverRegistry,
    ) -> Self {
        let store = SessionStore::new(SessionConfig {
            ttl: config.session_ttl,
            capacity: config.session_capacity,
        });
        let issuer = ChallengeIssuer::new(
            store.clone(),
            config.verifier_did.clone(),
            config.callback_url.clone(),
            config.reason.clone(),
        );
        let verifier = ProofVerifier::new(
            store,
            engine,
            keys,
            resolvers,
            VerifierConfig {
                proof_max_age: config.proof_max_age,
                resolver_timeout: config.resolver_timeout,
                engine_timeout: config.engine_timeout,
                ..VerifierConfig::default()
            },
        );
        Self {
            config: Arc::new(config),
            issuer,
            verifier,
            renderer: None,
            metrics: None,
        }
    }

    /// Render every issued challenge with `renderer`.
    pub fn with_renderer(mut self, renderer: Arc<dyn ChallengeRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Serve `/metrics` from `handle`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// The session store shared by issuer and verifier.
    pub fn sessions(&self) -> &SessionStore {
        self.verifier.sessions()
    }
}
