//! Pipeline orchestration
//!
//! `QueryPipeline::run` is the sole entry point surrounding subsystems
//! call: resolve config → get/refresh schema → build context →
//! translate → validate → execute → respond. Every failure maps into
//! the same [`QueryResponse`] envelope; nothing throws past this
//! boundary.

pub mod query_log;
pub mod response;

pub use query_log::{NoopQueryLog, QueryLog, QueryLogEntry, TracingQueryLog};
pub use response::{QueryResponse, ResultRow};

use crate::config::resolver::TenantConfigResolver;
use crate::context::builder::ContextBuilder;
use crate::error::SnowError;
use crate::executor::QueryExecutor;
use crate::llm::service::LanguageModelService;
use crate::metadata::store::MetadataStore;
use crate::schema::cache::SchemaCache;
use crate::translator::{ConversationTurn, Translator};
use crate::warehouse::driver::WarehouseDriver;
use crate::warehouse::pool::ConnectionPool;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

/// Upper bound on question length at the pipeline boundary
pub const MAX_QUESTION_CHARS: usize = 2000;

/// Explicitly constructed ownership of the pipeline's shared state:
/// the connection pool and schema cache live here (not in module-level
/// globals), with [`PipelineContext::shutdown`] as the single teardown
/// path.
pub struct PipelineContext {
    resolver: Arc<TenantConfigResolver>,
    pool: Arc<ConnectionPool>,
    cache: Arc<SchemaCache>,
    translator: Translator,
    executor: QueryExecutor,
    query_log: Arc<dyn QueryLog>,
}

impl PipelineContext {
    /// Wire up the pipeline from its four collaborators. The resolver's
    /// fallback config comes from `SNOWFLAKE_*` environment variables
    /// when present.
    pub fn new(
        store: Arc<dyn MetadataStore>,
        driver: Arc<dyn WarehouseDriver>,
        model: Arc<dyn LanguageModelService>,
        query_log: Arc<dyn QueryLog>,
    ) -> Self {
        let resolver = Arc::new(TenantConfigResolver::from_env(store.clone()));
        Self::with_resolver(resolver, store, driver, model, query_log)
    }

    /// Wire up the pipeline with an explicitly built resolver.
    pub fn with_resolver(
        resolver: Arc<TenantConfigResolver>,
        store: Arc<dyn MetadataStore>,
        driver: Arc<dyn WarehouseDriver>,
        model: Arc<dyn LanguageModelService>,
        query_log: Arc<dyn QueryLog>,
    ) -> Self {
        let pool = Arc::new(ConnectionPool::new(driver));
        let cache = Arc::new(SchemaCache::new(
            resolver.clone(),
            pool.clone(),
            store.clone(),
        ));
        let context_builder = Arc::new(ContextBuilder::new(
            resolver.clone(),
            cache.clone(),
            store,
        ));
        let translator = Translator::new(model, context_builder, resolver.clone());
        let executor = QueryExecutor::new(resolver.clone(), pool.clone());
        Self {
            resolver,
            pool,
            cache,
            translator,
            executor,
            query_log,
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn schema_cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    pub fn resolver(&self) -> &Arc<TenantConfigResolver> {
        &self.resolver
    }

    /// Close every warehouse connection.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

/// One pipeline invocation
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub question: String,
    pub tenant_id: String,
    pub user_id: String,
    /// When false, stop after translation (no warehouse statement runs)
    pub execute: bool,
    pub history: Vec<ConversationTurn>,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            tenant_id: tenant_id.into(),
            user_id: "guest".to_string(),
            execute: true,
            history: Vec::new(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn translation_only(mut self) -> Self {
        self.execute = false;
        self
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }
}

pub struct QueryPipeline {
    context: PipelineContext,
}

impl QueryPipeline {
    pub fn new(context: PipelineContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Run one question through the pipeline.
    pub async fn run(&self, request: QueryRequest) -> QueryResponse {
        self.run_cancellable(request, CancellationToken::new())
            .await
    }

    /// Run with an external cancellation token. Cancellation mid-flight
    /// discards the in-flight stage's result; a connection that died
    /// under a cancelled statement is evicted by the pool's liveness
    /// check on the next acquire.
    #[instrument(skip(self, request, cancel), fields(tenant_id = %request.tenant_id))]
    pub async fn run_cancellable(
        &self,
        request: QueryRequest,
        cancel: CancellationToken,
    ) -> QueryResponse {
        let start = Instant::now();
        let mut response = QueryResponse::for_question(&request.question);

        let trimmed = request.question.trim();
        if trimmed.is_empty() || request.question.len() > MAX_QUESTION_CHARS {
            response.error = Some(format!(
                "Invalid question (must be 1-{MAX_QUESTION_CHARS} characters)"
            ));
            self.log_outcome(&request, &response, start).await;
            return response;
        }

        // Translation: resolve config, refresh schema, build context,
        // call the model. Errors here mean no SQL exists yet.
        let translation = tokio::select! {
            _ = cancel.cancelled() => Err(SnowError::Cancelled),
            result = self.context.translator.translate(
                &request.question,
                &request.tenant_id,
                &request.history,
            ) => result,
        };

        let translation = match translation {
            Ok(translation) => translation,
            Err(error) => {
                response.error = Some(error.to_string());
                self.log_outcome(&request, &response, start).await;
                return response;
            }
        };

        response.sql = translation.sql.clone();
        response.explanation = translation.explanation.clone();
        response.assumptions = translation.assumptions.clone();

        if translation.error.is_some() || translation.sql.is_none() {
            response.error = Some(
                translation
                    .error
                    .unwrap_or_else(|| "No SQL generated".to_string()),
            );
            self.log_outcome(&request, &response, start).await;
            return response;
        }

        if !request.execute {
            self.log_outcome(&request, &response, start).await;
            return response;
        }

        let Some(sql) = translation.sql else {
            // Guarded above; translation without SQL already returned.
            self.log_outcome(&request, &response, start).await;
            return response;
        };
        let execution = tokio::select! {
            _ = cancel.cancelled() => Err(SnowError::Cancelled),
            result = self.context.executor.execute(&request.tenant_id, &sql) => result,
        };

        match execution {
            Ok(result) => {
                response.columns = result.columns;
                response.data = result.data;
                response.row_count = result.row_count;
                response.truncated = result.truncated;
                response.execution_time_ms = Some(start.elapsed().as_millis() as u64);
            }
            Err(error) => {
                // SQL stays in the response so the caller can show what
                // was attempted.
                response.error = Some(error.to_string());
            }
        }

        self.log_outcome(&request, &response, start).await;
        response
    }

    /// One durable record per terminal transition. Log failures are
    /// swallowed; they must not block the response.
    async fn log_outcome(&self, request: &QueryRequest, response: &QueryResponse, start: Instant) {
        let entry = QueryLogEntry {
            tenant_id: request.tenant_id.clone(),
            user_id: request.user_id.clone(),
            question: request.question.clone(),
            generated_sql: response.sql.clone(),
            explanation: response.explanation.clone(),
            row_count: if response.is_error() {
                None
            } else {
                Some(response.row_count)
            },
            execution_ms: Some(start.elapsed().as_millis() as u64),
            error: response.error.clone(),
        };
        if let Err(error) = self.context.query_log.record(entry).await {
            warn!("query log write failed: {error}");
        }
    }
}
