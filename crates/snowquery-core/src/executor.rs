//! Bounded query execution
//!
//! Runs a validated statement on the tenant's pooled connection under
//! the tenant's session timeout, truncates to the per-tenant row cap,
//! and serializes every cell to a JSON primitive. `truncated` is a
//! boolean signal; no second query is run to learn the exact overflow.

use crate::config::resolver::TenantConfigResolver;
use crate::error::{SnowError, SnowResult};
use crate::pipeline::response::ResultRow;
use crate::safety::SafetyValidator;
use crate::warehouse::driver::{RowSet, WarehouseValue};
use crate::warehouse::pool::ConnectionPool;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

/// Client-side slack on top of the session statement timeout, so the
/// warehouse gets the first chance to cancel.
const TIMEOUT_GRACE_SECS: u64 = 5;

/// Serialized result set, capped and primitive-only
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub data: Vec<ResultRow>,
    pub row_count: usize,
    pub truncated: bool,
}

pub struct QueryExecutor {
    resolver: Arc<TenantConfigResolver>,
    pool: Arc<ConnectionPool>,
}

impl QueryExecutor {
    pub fn new(resolver: Arc<TenantConfigResolver>, pool: Arc<ConnectionPool>) -> Self {
        Self { resolver, pool }
    }

    /// Validate and run one statement for a tenant.
    #[instrument(skip(self, sql))]
    pub async fn execute(&self, tenant_id: &str, sql: &str) -> SnowResult<QueryResult> {
        let config = self.resolver.resolve(tenant_id).await?;
        SafetyValidator::validate(sql)?;

        let connection = self.pool.acquire(tenant_id, &config).await?;

        connection
            .execute(&format!(
                "ALTER SESSION SET STATEMENT_TIMEOUT_IN_SECONDS = {}",
                config.query_timeout_secs
            ))
            .await
            .map_err(|e| SnowError::execution(format!("failed to set statement timeout: {e}")))?;

        let deadline = Duration::from_secs(config.query_timeout_secs + TIMEOUT_GRACE_SECS);
        let raw = match tokio::time::timeout(deadline, connection.execute(sql)).await {
            Ok(result) => result?,
            Err(_) => {
                // The statement result is discarded; keep the connection
                // only if it still answers a ping.
                if !connection.ping().await {
                    warn!(tenant_id, "connection dead after timeout, destroying");
                    self.pool.destroy(tenant_id).await;
                }
                return Err(SnowError::timeout(config.query_timeout_secs));
            }
        };

        Ok(serialize_result(raw, config.max_rows_per_query))
    }
}

/// Truncate to the row cap and flatten cells to primitives.
pub fn serialize_result(rows: RowSet, max_rows: usize) -> QueryResult {
    let truncated = rows.rows.len() >= max_rows;
    let columns = rows.columns;

    let data: Vec<ResultRow> = rows
        .rows
        .into_iter()
        .take(max_rows)
        .map(|row| {
            columns
                .iter()
                .cloned()
                .zip(row.into_iter().map(serialize_cell))
                .collect()
        })
        .collect();

    QueryResult {
        row_count: data.len(),
        truncated,
        columns,
        data,
    }
}

/// Dates become ISO-8601 strings, binary becomes hex; numbers, strings,
/// booleans, and null pass through unchanged.
fn serialize_cell(value: WarehouseValue) -> Value {
    match value {
        WarehouseValue::Null => Value::Null,
        WarehouseValue::Bool(b) => Value::Bool(b),
        WarehouseValue::Int(n) => Value::from(n),
        WarehouseValue::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        WarehouseValue::Text(t) => Value::String(t),
        WarehouseValue::Timestamp(ts) => {
            Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        WarehouseValue::Binary(bytes) => {
            let mut hex = String::with_capacity(bytes.len() * 2);
            for byte in bytes {
                hex.push_str(&format!("{byte:02x}"));
            }
            Value::String(hex)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tenant::{Credential, TenantConnectionConfig};
    use crate::metadata::store::InMemoryMetadataStore;
    use crate::warehouse::driver::{WarehouseConnection, WarehouseDriver};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(max_rows: usize) -> TenantConnectionConfig {
        TenantConnectionConfig {
            account: "acme".to_string(),
            user: "svc".to_string(),
            credential: Credential::Password("pw".to_string()),
            warehouse: "WH".to_string(),
            database: "DB".to_string(),
            schemas: vec!["PUBLIC".to_string()],
            role: "PUBLIC".to_string(),
            max_rows_per_query: max_rows,
            query_timeout_secs: 30,
        }
    }

    struct RecordingConnection {
        statements: Mutex<Vec<String>>,
        result: RowSet,
    }

    #[async_trait]
    impl WarehouseConnection for RecordingConnection {
        async fn ping(&self) -> bool {
            true
        }

        async fn execute(&self, sql: &str) -> SnowResult<RowSet> {
            self.statements.lock().push(sql.to_string());
            if sql.starts_with("ALTER SESSION") {
                return Ok(RowSet::default());
            }
            Ok(self.result.clone())
        }

        async fn close(&self) {}
    }

    struct FixedDriver {
        connection: Arc<RecordingConnection>,
        connects: AtomicUsize,
    }

    #[async_trait]
    impl WarehouseDriver for FixedDriver {
        async fn connect(
            &self,
            _config: &TenantConnectionConfig,
        ) -> SnowResult<Arc<dyn WarehouseConnection>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(self.connection.clone())
        }
    }

    fn executor_with(
        result: RowSet,
        max_rows: usize,
    ) -> (QueryExecutor, Arc<RecordingConnection>, Arc<FixedDriver>) {
        let connection = Arc::new(RecordingConnection {
            statements: Mutex::new(Vec::new()),
            result,
        });
        let driver = Arc::new(FixedDriver {
            connection: connection.clone(),
            connects: AtomicUsize::new(0),
        });
        let store = Arc::new(InMemoryMetadataStore::new());
        let resolver = Arc::new(TenantConfigResolver::with_fallback(
            store,
            config(max_rows),
        ));
        let pool = Arc::new(ConnectionPool::new(driver.clone()));
        (QueryExecutor::new(resolver, pool), connection, driver)
    }

    fn wide_result(rows: usize) -> RowSet {
        RowSet {
            columns: vec!["N".to_string()],
            rows: (0..rows)
                .map(|i| vec![WarehouseValue::Int(i as i64)])
                .collect(),
        }
    }

    #[tokio::test]
    async fn session_timeout_is_set_before_the_statement() {
        let (executor, connection, _) = executor_with(wide_result(1), 500);
        executor.execute("t1", "SELECT * FROM T").await.unwrap();

        let statements = connection.statements.lock();
        assert_eq!(
            statements[0],
            "ALTER SESSION SET STATEMENT_TIMEOUT_IN_SECONDS = 30"
        );
        assert_eq!(statements[1], "SELECT * FROM T");
    }

    #[tokio::test]
    async fn oversized_result_is_truncated_with_flag() {
        let (executor, _, _) = executor_with(wide_result(1500), 500);
        let result = executor.execute("t1", "SELECT * FROM T").await.unwrap();
        assert_eq!(result.data.len(), 500);
        assert_eq!(result.row_count, 500);
        assert!(result.truncated);
    }

    #[tokio::test]
    async fn small_result_is_not_truncated() {
        let (executor, _, _) = executor_with(wide_result(10), 500);
        let result = executor.execute("t1", "SELECT * FROM T").await.unwrap();
        assert_eq!(result.row_count, 10);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn unsafe_sql_is_rejected_before_any_connection() {
        let (executor, _, driver) = executor_with(wide_result(1), 500);
        let result = executor.execute("t1", "DROP TABLE T").await;
        assert!(matches!(result, Err(SnowError::UnsafeQuery { .. })));
        assert_eq!(driver.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cells_serialize_to_primitives() {
        let rows = RowSet {
            columns: vec![
                "WHEN".to_string(),
                "BLOB".to_string(),
                "OK".to_string(),
                "NOTHING".to_string(),
            ],
            rows: vec![vec![
                WarehouseValue::Timestamp(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()),
                WarehouseValue::Binary(vec![0xde, 0xad]),
                WarehouseValue::Bool(true),
                WarehouseValue::Null,
            ]],
        };
        let (executor, _, _) = executor_with(rows, 500);
        let result = executor.execute("t1", "SELECT * FROM T").await.unwrap();

        let row = &result.data[0];
        assert_eq!(row["WHEN"], "2024-03-01T12:30:00.000Z");
        assert_eq!(row["BLOB"], "dead");
        assert_eq!(row["OK"], true);
        assert_eq!(row["NOTHING"], Value::Null);
    }

    #[tokio::test(start_paused = true)]
    async fn overrunning_statement_times_out_and_evicts_dead_connection() {
        struct SlowConnection {
            alive: std::sync::atomic::AtomicBool,
        }

        #[async_trait]
        impl WarehouseConnection for SlowConnection {
            async fn ping(&self) -> bool {
                self.alive.load(Ordering::SeqCst)
            }

            async fn execute(&self, sql: &str) -> SnowResult<RowSet> {
                if sql.starts_with("ALTER SESSION") {
                    return Ok(RowSet::default());
                }
                // Statement hangs well past the session timeout; the
                // connection is dead by the time anyone asks.
                self.alive.store(false, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok(RowSet::default())
            }

            async fn close(&self) {}
        }

        struct SlowDriver {
            connects: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl WarehouseDriver for SlowDriver {
            async fn connect(
                &self,
                _config: &TenantConnectionConfig,
            ) -> SnowResult<Arc<dyn WarehouseConnection>> {
                self.connects.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(SlowConnection {
                    alive: std::sync::atomic::AtomicBool::new(true),
                }))
            }
        }

        let connects = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(InMemoryMetadataStore::new());
        let resolver = Arc::new(TenantConfigResolver::with_fallback(store, config(500)));
        let pool = Arc::new(ConnectionPool::new(Arc::new(SlowDriver {
            connects: connects.clone(),
        })));
        let executor = QueryExecutor::new(resolver, pool.clone());

        let error = executor.execute("t1", "SELECT 1").await.unwrap_err();
        assert!(matches!(error, SnowError::Timeout { seconds: 30 }));

        // The dead connection was destroyed; the next acquire reconnects.
        pool.acquire("t1", &config(500)).await.unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn execution_failure_carries_the_warehouse_message() {
        struct FailingConnection;

        #[async_trait]
        impl WarehouseConnection for FailingConnection {
            async fn ping(&self) -> bool {
                true
            }

            async fn execute(&self, sql: &str) -> SnowResult<RowSet> {
                if sql.starts_with("ALTER SESSION") {
                    return Ok(RowSet::default());
                }
                Err(SnowError::execution("SQL compilation error: line 1"))
            }

            async fn close(&self) {}
        }

        struct FailingDriver;

        #[async_trait]
        impl WarehouseDriver for FailingDriver {
            async fn connect(
                &self,
                _config: &TenantConnectionConfig,
            ) -> SnowResult<Arc<dyn WarehouseConnection>> {
                Ok(Arc::new(FailingConnection))
            }
        }

        let store = Arc::new(InMemoryMetadataStore::new());
        let resolver = Arc::new(TenantConfigResolver::with_fallback(store, config(500)));
        let pool = Arc::new(ConnectionPool::new(Arc::new(FailingDriver)));
        let executor = QueryExecutor::new(resolver, pool);

        let error = executor.execute("t1", "SELECT 1").await.unwrap_err();
        assert!(error.to_string().contains("SQL compilation error"));
    }
}
