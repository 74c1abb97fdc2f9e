//! Snowquery Core Library
//!
//! Turns natural-language questions into bounded, tenant-isolated SQL
//! warehouse access: per-tenant connection lifecycle, schema
//! introspection with a staleness-bounded cache, enriched prompt
//! context, LLM translation with bounded retry, static SQL safety
//! validation, and capped execution, orchestrated by [`pipeline::QueryPipeline`].

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod llm;
pub mod metadata;
pub mod pipeline;
pub mod safety;
pub mod schema;
pub mod translator;
pub mod warehouse;

// Re-export commonly used types
pub use config::{Credential, TenantConfigResolver, TenantConnectionConfig};
pub use context::ContextBuilder;
pub use error::{SnowError, SnowResult};
pub use executor::{QueryExecutor, QueryResult};
pub use llm::{AnthropicModel, LanguageModelService, ModelOptions};
pub use metadata::{InMemoryMetadataStore, MetadataStore};
pub use pipeline::{
    NoopQueryLog, PipelineContext, QueryLog, QueryPipeline, QueryRequest, QueryResponse,
    TracingQueryLog,
};
pub use safety::SafetyValidator;
pub use schema::{SchemaCache, SchemaIntrospector, SchemaSnapshot};
pub use translator::{ConversationTurn, TranslationResult, Translator};
pub use warehouse::{ConnectionPool, RestDriverOptions, RestWarehouseDriver, WarehouseDriver};
