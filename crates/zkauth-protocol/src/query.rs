//! # Query Specification Builder
//!
//! A [`ProofRequest`] asks the holder to prove, with a given circuit, that
//! a credential of some type from an allowed issuer satisfies a set of
//! predicates on its subject attributes. Predicates are conjunctive.
//!
//! Predicates are a closed operator enum with a typed operand. Ordering
//! operators take integers, `$in` takes a non-empty set, and equality
//! takes any scalar. Invalid combinations are unrepresentable past
//! [`Predicate::new`], and deserialization goes through the same
//! constructor.
//!
//! ## Wire Shape
//!
//! ```json
//! {
//!   "id": 1,
//!   "circuitId": "credentialAtomicQuerySigV2",
//!   "query": {
//!     "allowedIssuers": ["*"],
//!     "context": "https://.../kyc-v4.jsonld",
//!     "credentialSubject": { "birthday": { "$lt": 20000101 } },
//!     "type": "KYCAgeCredential"
//!   }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::str::FromStr;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use url::Url;
use zkauth_core::{sha256_digest, CanonicalBytes, CanonicalizationError, CircuitId, ContentDigest, Did};

/// Wildcard entry in `allowedIssuers` meaning "any issuer".
pub const ANY_ISSUER: &str = "*";

/// URI schemes accepted for a query's JSON-LD context.
const CONTEXT_SCHEMES: [&str; 3] = ["https", "http", "ipfs"];

/// Errors building or validating a proof request.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Scope entries must use a credential query circuit.
    #[error("circuit {0} cannot be requested in a proof scope")]
    UnsupportedCircuit(CircuitId),

    /// `allowedIssuers` was empty.
    #[error("allowedIssuers must not be empty")]
    NoAllowedIssuers,

    /// The wildcard was combined with explicit issuers.
    #[error("allowedIssuers wildcard \"*\" cannot be combined with explicit issuers")]
    MixedWildcard,

    /// An allowed issuer is not a DID.
    #[error("invalid allowed issuer: \"{0}\"")]
    InvalidIssuer(String),

    /// Credential type was empty or contained whitespace.
    #[error("invalid credential type: \"{0}\"")]
    InvalidCredentialType(String),

    /// Context is not a usable schema URI.
    #[error("invalid context \"{value}\": {reason}")]
    InvalidContext {
        /// The rejected context.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A predicate targets an empty attribute name.
    #[error("predicate attribute name must not be empty")]
    EmptyAttribute,

    /// Two predicates target the same attribute.
    #[error("duplicate predicate for attribute \"{0}\"")]
    DuplicateAttribute(String),

    /// Operator is not one of the supported comparison operators.
    #[error("unknown operator \"{0}\"")]
    UnknownOperator(String),

    /// Operand type does not fit the operator.
    #[error("operator {operator} {reason}")]
    OperandMismatch {
        /// The operator.
        operator: Operator,
        /// What the operator requires.
        reason: &'static str,
    },

    /// Two scope entries share an id.
    #[error("duplicate proof request id {0} in scope")]
    DuplicateRequestId(u32),

    /// Query could not be canonicalized for hashing.
    #[error("query hash: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operator {
    /// Less than.
    #[serde(rename = "$lt")]
    Lt,
    /// Less than or equal.
    #[serde(rename = "$lte")]
    Lte,
    /// Greater than.
    #[serde(rename = "$gt")]
    Gt,
    /// Greater than or equal.
    #[serde(rename = "$gte")]
    Gte,
    /// Equal.
    #[serde(rename = "$eq")]
    Eq,
    /// Not equal.
    #[serde(rename = "$ne")]
    Neq,
    /// Member of a set.
    #[serde(rename = "$in")]
    In,
}

impl Operator {
    /// All operators.
    pub const ALL: [Operator; 7] = [
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::Eq,
        Operator::Neq,
        Operator::In,
    ];

    /// Wire name (`$lt`, `$in`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Eq => "$eq",
            Operator::Neq => "$ne",
            Operator::In => "$in",
        }
    }

    fn is_ordering(self) -> bool {
        matches!(self, Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| QueryError::UnknownOperator(s.to_string()))
    }
}

/// A single literal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Integer literal (dates are encoded as `YYYYMMDD` integers).
    Integer(i64),
    /// Boolean literal.
    Boolean(bool),
    /// String literal.
    Text(String),
}

/// The right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    /// One literal.
    Scalar(Scalar),
    /// A set of literals, for `$in`.
    Set(Vec<Scalar>),
}

impl Operand {
    /// Integer operand.
    pub fn integer(value: i64) -> Self {
        Operand::Scalar(Scalar::Integer(value))
    }

    /// String operand.
    pub fn text(value: impl Into<String>) -> Self {
        Operand::Scalar(Scalar::Text(value.into()))
    }

    /// Boolean operand.
    pub fn boolean(value: bool) -> Self {
        Operand::Scalar(Scalar::Boolean(value))
    }

    /// Set operand.
    pub fn set(values: impl IntoIterator<Item = Scalar>) -> Self {
        Operand::Set(values.into_iter().collect())
    }
}

/// One operator applied to one attribute with one operand.
///
/// Serializes as a single-entry object: `{"$lt": 20000101}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    operator: Operator,
    operand: Operand,
}

impl Predicate {
    /// Create a predicate, checking the operand fits the operator.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::OperandMismatch`] when the operand type is not
    /// valid for the operator.
    pub fn new(operator: Operator, operand: Operand) -> Result<Self, QueryError> {
        let mismatch = |reason: &'static str| -> Result<Self, QueryError> {
            Err(QueryError::OperandMismatch { operator, reason })
        };
        match (&operand, operator) {
            (Operand::Set(values), Operator::In) if values.is_empty() => {
                return mismatch("requires a non-empty set");
            }
            (Operand::Set(_), Operator::In) => {}
            (_, Operator::In) => return mismatch("requires a set operand"),
            (Operand::Set(_), _) => return mismatch("requires a single value"),
            (Operand::Scalar(Scalar::Integer(_)), op) if op.is_ordering() => {}
            (Operand::Scalar(_), op) if op.is_ordering() => {
                return mismatch("requires an integer operand");
            }
            (Operand::Scalar(_), _) => {}
        }
        Ok(Self { operator, operand })
    }

    /// `attribute < value`.
    pub fn less_than(value: i64) -> Self {
        Self {
            operator: Operator::Lt,
            operand: Operand::integer(value),
        }
    }

    /// The operator.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// The operand.
    pub fn operand(&self) -> &Operand {
        &self.operand
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.operator.as_str(), &self.operand)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Operand>::deserialize(deserializer)?;
        let mut entries = raw.into_iter();
        let (Some((operator, operand)), None) = (entries.next(), entries.next()) else {
            return Err(D::Error::custom(
                "predicate must contain exactly one operator",
            ));
        };
        let operator: Operator = operator.parse().map_err(D::Error::custom)?;
        Predicate::new(operator, operand).map_err(D::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Allowed issuers
// ---------------------------------------------------------------------------

/// Issuers whose credentials satisfy a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedIssuers {
    /// Any issuer (`["*"]`).
    Any,
    /// Exactly these issuers.
    Only(BTreeSet<Did>),
}

impl AllowedIssuers {
    /// Restrict to the given issuers.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NoAllowedIssuers`] for an empty set.
    pub fn only(issuers: impl IntoIterator<Item = Did>) -> Result<Self, QueryError> {
        let set: BTreeSet<Did> = issuers.into_iter().collect();
        if set.is_empty() {
            return Err(QueryError::NoAllowedIssuers);
        }
        Ok(AllowedIssuers::Only(set))
    }

    /// Parse the wire list, where `"*"` alone means any issuer.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] for an empty list, a wildcard mixed with
    /// explicit entries, or an entry that is not a DID.
    pub fn from_strings<I, S>(values: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values: Vec<S> = values.into_iter().collect();
        let has_wildcard = values.iter().any(|v| v.as_ref() == ANY_ISSUER);
        match (values.len(), has_wildcard) {
            (0, _) => Err(QueryError::NoAllowedIssuers),
            (1, true) => Ok(AllowedIssuers::Any),
            (_, true) => Err(QueryError::MixedWildcard),
            _ => {
                let dids = values
                    .iter()
                    .map(|v| {
                        Did::new(v.as_ref())
                            .map_err(|_| QueryError::InvalidIssuer(v.as_ref().to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Self::only(dids)
            }
        }
    }

    /// Whether credentials from `issuer` are acceptable.
    pub fn allows(&self, issuer: &Did) -> bool {
        match self {
            AllowedIssuers::Any => true,
            AllowedIssuers::Only(set) => set.contains(issuer),
        }
    }

    fn to_strings(&self) -> Vec<String> {
        match self {
            AllowedIssuers::Any => vec![ANY_ISSUER.to_string()],
            AllowedIssuers::Only(set) => set.iter().map(|d| d.as_str().to_string()).collect(),
        }
    }
}

impl Serialize for AllowedIssuers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_strings().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AllowedIssuers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<String>::deserialize(deserializer)?;
        AllowedIssuers::from_strings(values).map_err(D::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Query and proof request
// ---------------------------------------------------------------------------

/// What the holder must prove about one credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// Acceptable credential issuers.
    pub allowed_issuers: AllowedIssuers,
    /// JSON-LD context defining the credential type.
    pub context: Url,
    /// Conjunctive predicates keyed by subject attribute.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub credential_subject: BTreeMap<String, Predicate>,
    /// Credential type name.
    #[serde(rename = "type")]
    pub credential_type: String,
}

impl Query {
    /// Check the fields serde cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] for an invalid credential type, context, or
    /// attribute name.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.credential_type.is_empty() || self.credential_type.chars().any(char::is_whitespace) {
            return Err(QueryError::InvalidCredentialType(self.credential_type.clone()));
        }
        validate_context(&self.context)?;
        if self.credential_subject.keys().any(|k| k.trim().is_empty()) {
            return Err(QueryError::EmptyAttribute);
        }
        Ok(())
    }

    /// SHA-256 of the query's canonical JSON. Holders bind this value into
    /// the `queryHash` public signal.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Canonicalization`] if the query cannot be
    /// canonicalized.
    pub fn hash(&self) -> Result<ContentDigest, QueryError> {
        Ok(sha256_digest(&CanonicalBytes::new(self)?))
    }
}

fn validate_context(context: &Url) -> Result<(), QueryError> {
    let invalid = |reason: &str| QueryError::InvalidContext {
        value: context.to_string(),
        reason: reason.to_string(),
    };
    if !CONTEXT_SCHEMES.contains(&context.scheme()) {
        return Err(invalid("scheme must be https, http or ipfs"));
    }
    if context.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(())
}

/// One entry of an authorization request's scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRequest {
    /// Request id, unique within the scope. Echoed as `requestID` in the
    /// proof's public signals.
    pub id: u32,
    /// Circuit the holder must prove with.
    pub circuit_id: CircuitId,
    /// What must be proven.
    pub query: Query,
}

impl ProofRequest {
    /// Build and validate a proof request.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the circuit is not a query circuit, the
    /// credential type or context is invalid, or an attribute name is empty
    /// or repeated.
    pub fn build<I, K>(
        id: u32,
        circuit_id: CircuitId,
        allowed_issuers: AllowedIssuers,
        credential_type: impl Into<String>,
        context: &str,
        predicates: I,
    ) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, Predicate)>,
        K: Into<String>,
    {
        let context = Url::parse(context).map_err(|e| QueryError::InvalidContext {
            value: context.to_string(),
            reason: e.to_string(),
        })?;

        let mut credential_subject = BTreeMap::new();
        for (attribute, predicate) in predicates {
            let attribute = attribute.into();
            if attribute.trim().is_empty() {
                return Err(QueryError::EmptyAttribute);
            }
            if credential_subject.contains_key(&attribute) {
                return Err(QueryError::DuplicateAttribute(attribute));
            }
            credential_subject.insert(attribute, predicate);
        }

        let request = Self {
            id,
            circuit_id,
            query: Query {
                allowed_issuers,
                context,
                credential_subject,
                credential_type: credential_type.into(),
            },
        };
        request.validate()?;
        Ok(request)
    }

    /// Validate a request obtained by deserialization.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] as for [`ProofRequest::build`].
    pub fn validate(&self) -> Result<(), QueryError> {
        if !self.circuit_id.is_query_circuit() {
            return Err(QueryError::UnsupportedCircuit(self.circuit_id));
        }
        self.query.validate()
    }

    /// Hash of this request's query.
    ///
    /// # Errors
    ///
    /// See [`Query::hash`].
    pub fn query_hash(&self) -> Result<ContentDigest, QueryError> {
        self.query.hash()
    }
}

/// Validate a whole scope: every entry valid and ids unique.
///
/// An empty scope is valid and requests authentication only.
///
/// # Errors
///
/// Returns the first [`QueryError`] found.
pub fn validate_scope(scope: &[ProofRequest]) -> Result<(), QueryError> {
    let mut seen = HashSet::with_capacity(scope.len());
    for request in scope {
        if !seen.insert(request.id) {
            return Err(QueryError::DuplicateRequestId(request.id));
        }
        request.validate()?;
    }
    Ok(())
}
