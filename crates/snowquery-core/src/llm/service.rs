//! Language-model service client
//!
//! The translator consumes models through the [`LanguageModelService`]
//! trait; the shipped implementation targets the Anthropic messages
//! API. Temperature is pinned to zero by the client: SQL generation
//! needs deterministic, structured output, not creative variety.

use crate::error::{SnowError, SnowResult};
use crate::llm::messages::ChatMessage;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
// Generous output budget; truncated responses are unparseable responses.
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Synchronous completion interface the translator depends on.
///
/// No streaming: the translator needs the whole body before it can
/// extract the JSON payload.
#[async_trait]
pub trait LanguageModelService: Send + Sync {
    /// Send a system instruction plus conversation and return the raw
    /// response text.
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> SnowResult<String>;
}

/// Options for the Anthropic-backed model client
#[derive(Debug, Clone)]
pub struct ModelOptions {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub api_version: String,
    pub max_tokens: u32,
    /// Fixed upper bound for one model call
    pub request_timeout_secs: u64,
}

impl ModelOptions {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Anthropic messages API client
pub struct AnthropicModel {
    options: ModelOptions,
    http: Client,
}

impl AnthropicModel {
    pub fn new(options: ModelOptions) -> SnowResult<Self> {
        if options.api_key.trim().is_empty() {
            return Err(SnowError::configuration("model API key must not be empty"));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(options.request_timeout_secs))
            .build()
            .map_err(|e| SnowError::llm(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { options, http })
    }
}

#[async_trait]
impl LanguageModelService for AnthropicModel {
    #[instrument(skip(self, system, messages), fields(model = %self.options.model))]
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> SnowResult<String> {
        let url = format!("{}/v1/messages", self.options.base_url);

        let request_body = json!({
            "model": self.options.model,
            "max_tokens": self.options.max_tokens,
            "temperature": 0,
            "system": system,
            "messages": messages
                .iter()
                .map(|m| json!({"role": m.role.to_string(), "content": m.content}))
                .collect::<Vec<_>>(),
        });

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.options.api_key)
            .header("anthropic-version", &self.options.api_version)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| SnowError::llm(format!("model request failed: {e}")))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| SnowError::llm(format!("malformed model response: {e}")))?;

        if !status.is_success() {
            let message = payload["error"]["message"]
                .as_str()
                .unwrap_or("request rejected");
            return Err(SnowError::llm(format!("{status}: {message}")));
        }

        // The content array may interleave blocks; concatenate the text.
        let mut text = String::new();
        if let Some(blocks) = payload["content"].as_array() {
            for block in blocks {
                if block["type"].as_str() == Some("text") {
                    if let Some(chunk) = block["text"].as_str() {
                        if !text.is_empty() {
                            text.push('\n');
                        }
                        text.push_str(chunk);
                    }
                }
            }
        }

        debug!(chars = text.len(), "model completion received");
        Ok(text)
    }
}
