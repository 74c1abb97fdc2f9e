//! Query log collaborator interface
//!
//! Write-only from the core's perspective: one record per terminal
//! pipeline transition. A failed log write must never convert a
//! well-formed response into an error, so the pipeline swallows
//! failures from `record`.

use crate::error::SnowResult;
use async_trait::async_trait;
use tracing::info;

/// One durable record of a pipeline run
#[derive(Debug, Clone, Default)]
pub struct QueryLogEntry {
    pub tenant_id: String,
    pub user_id: String,
    pub question: String,
    pub generated_sql: Option<String>,
    pub explanation: Option<String>,
    pub row_count: Option<usize>,
    pub execution_ms: Option<u64>,
    pub error: Option<String>,
}

#[async_trait]
pub trait QueryLog: Send + Sync {
    async fn record(&self, entry: QueryLogEntry) -> SnowResult<()>;
}

/// Discards every record. For deployments without a log sink.
pub struct NoopQueryLog;

#[async_trait]
impl QueryLog for NoopQueryLog {
    async fn record(&self, _entry: QueryLogEntry) -> SnowResult<()> {
        Ok(())
    }
}

/// Emits each record as a structured tracing event.
pub struct TracingQueryLog;

#[async_trait]
impl QueryLog for TracingQueryLog {
    async fn record(&self, entry: QueryLogEntry) -> SnowResult<()> {
        info!(
            tenant_id = %entry.tenant_id,
            user_id = %entry.user_id,
            question = %entry.question,
            sql = entry.generated_sql.as_deref().unwrap_or(""),
            row_count = entry.row_count.unwrap_or(0),
            execution_ms = entry.execution_ms.unwrap_or(0),
            error = entry.error.as_deref().unwrap_or(""),
            "query"
        );
        Ok(())
    }
}
