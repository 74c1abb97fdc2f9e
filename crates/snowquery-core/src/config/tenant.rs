//! Per-tenant warehouse connection configuration

use crate::error::{SnowError, SnowResult};
use serde::{Deserialize, Serialize};

/// Bounds for the per-query row cap
pub const MIN_ROWS_PER_QUERY: usize = 10;
pub const MAX_ROWS_PER_QUERY: usize = 10_000;

/// Bounds for the per-statement timeout
pub const MIN_QUERY_TIMEOUT_SECS: u64 = 5;
pub const MAX_QUERY_TIMEOUT_SECS: u64 = 120;

/// Warehouse credential. Exactly one mode is ever present; the
/// constructor rejects neither/both before any network call is made.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credential {
    /// Password authentication
    Password(String),
    /// Signed key-pair material, sent as a KEYPAIR_JWT bearer token
    KeyPair(String),
}

// Secrets stay out of logs and spans.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password(_) => write!(f, "Password(***)"),
            Self::KeyPair(_) => write!(f, "KeyPair(***)"),
        }
    }
}

impl Credential {
    /// Build a credential from optional password / key-pair inputs,
    /// enforcing mutual exclusivity.
    pub fn from_parts(
        password: Option<String>,
        key_pair: Option<String>,
    ) -> SnowResult<Self> {
        match (password, key_pair) {
            (Some(p), None) => Ok(Self::Password(p)),
            (None, Some(k)) => Ok(Self::KeyPair(k)),
            (Some(_), Some(_)) => Err(SnowError::configuration(
                "password and key-pair credentials are mutually exclusive",
            )),
            (None, None) => Err(SnowError::configuration(
                "a password or key-pair credential is required",
            )),
        }
    }

    /// True when this is a password credential
    pub fn is_password(&self) -> bool {
        matches!(self, Self::Password(_))
    }
}

/// Resolved connection parameters for one tenant.
///
/// Immutable once resolved for a request; the resolver produces a fresh
/// copy per request and nothing beyond the pool's connection object is
/// cached from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConnectionConfig {
    /// Account identifier
    pub account: String,
    /// Principal (user or service identity)
    pub user: String,
    /// Authentication credential
    pub credential: Credential,
    /// Warehouse (compute unit) name
    pub warehouse: String,
    /// Database name
    pub database: String,
    /// Schema names; the first entry is the default schema
    pub schemas: Vec<String>,
    /// Role to assume for the session
    pub role: String,
    /// Row cap applied to every query result
    pub max_rows_per_query: usize,
    /// Session statement timeout in seconds
    pub query_timeout_secs: u64,
}

impl TenantConnectionConfig {
    /// Validate ranges and structural invariants.
    ///
    /// Called by the resolver on every resolved config so that invalid
    /// tenant records surface as `Configuration` errors rather than
    /// failing deep inside the executor.
    pub fn validate(&self) -> SnowResult<()> {
        if self.account.trim().is_empty() {
            return Err(SnowError::configuration("account must not be empty"));
        }
        if self.user.trim().is_empty() {
            return Err(SnowError::configuration("user must not be empty"));
        }
        if self.database.trim().is_empty() {
            return Err(SnowError::configuration("database must not be empty"));
        }
        if self.schemas.is_empty() || self.schemas.iter().any(|s| s.trim().is_empty()) {
            return Err(SnowError::configuration(
                "at least one non-empty schema is required",
            ));
        }
        if !(MIN_ROWS_PER_QUERY..=MAX_ROWS_PER_QUERY).contains(&self.max_rows_per_query) {
            return Err(SnowError::configuration(format!(
                "max_rows_per_query must be between {} and {}, got {}",
                MIN_ROWS_PER_QUERY, MAX_ROWS_PER_QUERY, self.max_rows_per_query
            )));
        }
        if !(MIN_QUERY_TIMEOUT_SECS..=MAX_QUERY_TIMEOUT_SECS).contains(&self.query_timeout_secs) {
            return Err(SnowError::configuration(format!(
                "query_timeout_secs must be between {} and {}, got {}",
                MIN_QUERY_TIMEOUT_SECS, MAX_QUERY_TIMEOUT_SECS, self.query_timeout_secs
            )));
        }
        Ok(())
    }

    /// The default schema (first configured entry)
    pub fn default_schema(&self) -> &str {
        &self.schemas[0]
    }
}
