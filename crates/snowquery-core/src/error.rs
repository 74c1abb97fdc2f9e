//! Error types for the Snowquery pipeline

use thiserror::Error;

/// Result type alias for Snowquery operations
pub type SnowResult<T> = Result<T, SnowError>;

/// Main error type for the Snowquery pipeline
#[derive(Error, Debug, Clone)]
pub enum SnowError {
    /// No usable tenant credentials or invalid tenant configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Warehouse connect handshake or authentication failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Metadata query failure during schema refresh
    #[error("Introspection error: {0}")]
    Introspection(String),

    /// SQL statement rejected by the safety validator
    #[error("Unsafe query: {reason}")]
    UnsafeQuery { reason: String },

    /// Warehouse rejected or failed the statement
    #[error("Execution error: {0}")]
    Execution(String),

    /// Language-model service errors (transport, not parse failures)
    #[error("LLM error: {0}")]
    Llm(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Operation exceeded its deadline
    #[error("Timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// The request was cancelled
    #[error("Request was cancelled")]
    Cancelled,

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl SnowError {
    /// Create a new configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a new connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a new introspection error
    pub fn introspection(message: impl Into<String>) -> Self {
        Self::Introspection(message.into())
    }

    /// Create a new unsafe-query error
    pub fn unsafe_query(reason: impl Into<String>) -> Self {
        Self::UnsafeQuery {
            reason: reason.into(),
        }
    }

    /// Create a new execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Create a new LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create a new timeout error
    pub const fn timeout(seconds: u64) -> Self {
        Self::Timeout { seconds }
    }
}

impl From<std::io::Error> for SnowError {
    fn from(error: std::io::Error) -> Self {
        Self::Other(error.to_string())
    }
}

impl From<serde_json::Error> for SnowError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<reqwest::Error> for SnowError {
    fn from(error: reqwest::Error) -> Self {
        Self::Http(error.to_string())
    }
}
