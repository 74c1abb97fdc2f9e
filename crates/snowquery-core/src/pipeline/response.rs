//! Uniform response envelope
//!
//! Every pipeline run resolves to this one shape: success, translation
//! failure, safety rejection, or execution failure. Callers never see a
//! raw error; the envelope's `error` field carries failure text, and
//! the generated SQL stays present when failure happened after
//! translation so the caller can show what was attempted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of serialized results: column name to primitive value
pub type ResultRow = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,
    pub sql: Option<String>,
    pub explanation: Option<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<ResultRow>,
    #[serde(default)]
    pub row_count: usize,
    #[serde(default)]
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
}

impl QueryResponse {
    /// Empty envelope for a question; fields are filled in as the
    /// pipeline progresses.
    pub fn for_question(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    /// True when the run produced an error (at any stage)
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
