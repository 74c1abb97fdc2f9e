//! Natural-language to SQL translation
//!
//! Builds the enriched context and system instruction, sends the
//! question (plus the bounded history window) to the language-model
//! service, and parses the structured result. A malformed response gets
//! exactly one retry with an amended JSON-only instruction; after the
//! second failure the outcome is an in-band `TranslationResult` error,
//! never a thrown one.

pub mod history;
pub mod prompt;

pub use history::{ConversationTurn, HISTORY_WINDOW_TURNS, history_messages, summarize_response};
pub use prompt::{JSON_RETRY_SUFFIX, build_system_prompt};

use crate::config::resolver::TenantConfigResolver;
use crate::context::builder::ContextBuilder;
use crate::error::SnowResult;
use crate::llm::extract::extract_json_object;
use crate::llm::messages::ChatMessage;
use crate::llm::service::LanguageModelService;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Parse attempts before giving up (initial call + one retry)
pub const MAX_TRANSLATE_ATTEMPTS: usize = 2;

/// How much of an unparseable response survives for diagnosis
const EXCERPT_CHARS: usize = 500;

/// Structured outcome of one translation.
///
/// On a successful parse exactly one of `sql`/`error` is set;
/// `assumptions` is always a list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationResult {
    pub sql: Option<String>,
    pub explanation: Option<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    pub error: Option<String>,
}

impl TranslationResult {
    /// Validate and convert an extracted JSON object.
    ///
    /// The object must carry `explanation` and `assumptions` keys plus
    /// at least one of `sql`/`error`; anything else is a parse failure
    /// that feeds the retry.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if !object.contains_key("explanation") || !object.contains_key("assumptions") {
            return None;
        }
        if !object.contains_key("sql") && !object.contains_key("error") {
            return None;
        }

        let non_empty = |key: &str| {
            object
                .get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        };

        let assumptions = object
            .get("assumptions")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            sql: non_empty("sql"),
            explanation: non_empty("explanation"),
            assumptions,
            error: non_empty("error"),
        })
    }

    /// In-band failure result
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

pub struct Translator {
    model: Arc<dyn LanguageModelService>,
    context_builder: Arc<ContextBuilder>,
    resolver: Arc<TenantConfigResolver>,
}

impl Translator {
    pub fn new(
        model: Arc<dyn LanguageModelService>,
        context_builder: Arc<ContextBuilder>,
        resolver: Arc<TenantConfigResolver>,
    ) -> Self {
        Self {
            model,
            context_builder,
            resolver,
        }
    }

    /// Translate a question into a candidate SQL statement.
    ///
    /// Context or transport failures propagate as errors; parse
    /// failures resolve in-band after the bounded retry.
    #[instrument(skip(self, question, history))]
    pub async fn translate(
        &self,
        question: &str,
        tenant_id: &str,
        history: &[ConversationTurn],
    ) -> SnowResult<TranslationResult> {
        let config = self.resolver.resolve(tenant_id).await?;
        let context = self.context_builder.build(tenant_id).await?;
        let system = build_system_prompt(
            &context,
            &config.database,
            config.default_schema(),
            config.max_rows_per_query,
        );

        let mut messages = history_messages(history);
        messages.push(ChatMessage::user(question));

        let mut last_response = String::new();
        for attempt in 1..=MAX_TRANSLATE_ATTEMPTS {
            let system_text = if attempt == 1 {
                system.clone()
            } else {
                format!("{system}{JSON_RETRY_SUFFIX}")
            };

            let raw = self.model.complete(&system_text, &messages).await?;
            if let Some(parsed) = extract_json_object(&raw).as_ref().and_then(TranslationResult::from_json)
            {
                return Ok(parsed);
            }

            warn!(attempt, "model response was not a parseable translation");
            last_response = raw;
        }

        let excerpt: String = last_response.chars().take(EXCERPT_CHARS).collect();
        Ok(TranslationResult::failed(format!(
            "Failed to parse response after {MAX_TRANSLATE_ATTEMPTS} attempts. Last response: {excerpt}"
        )))
    }
}
