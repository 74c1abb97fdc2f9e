//! Language-model integration: the service trait, the Anthropic-backed
//! client, chat message types, and response JSON extraction.

pub mod extract;
pub mod messages;
pub mod service;

pub use extract::extract_json_object;
pub use messages::{ChatMessage, ChatRole};
pub use service::{AnthropicModel, LanguageModelService, ModelOptions};
