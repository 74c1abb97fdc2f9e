//! Warehouse driver abstraction
//!
//! The pipeline talks to the warehouse through these traits so the pool,
//! introspector, and executor stay independent of the wire protocol. The
//! shipped implementation is the SQL REST driver in [`super::rest`];
//! tests substitute scripted drivers.

use crate::config::tenant::TenantConnectionConfig;
use crate::error::SnowResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// One cell as produced by the warehouse driver.
///
/// Dates and binary stay typed here; the executor serializes them to
/// primitives (ISO-8601 strings, hex strings) at the response boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum WarehouseValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Binary(Vec<u8>),
}

/// An executed statement's raw result
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    /// Ordered column names
    pub columns: Vec<String>,
    /// Rows in result order; each row is ordered like `columns`
    pub rows: Vec<Vec<WarehouseValue>>,
}

impl RowSet {
    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell lookup by row index and column name
    pub fn cell(&self, row: usize, column: &str) -> Option<&WarehouseValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }
}

/// A live session against the tenant's warehouse
#[async_trait]
pub trait WarehouseConnection: Send + Sync {
    /// Cheap liveness check; false once the session is known dead
    async fn ping(&self) -> bool;

    /// Run one statement and read back the full result set
    async fn execute(&self, sql: &str) -> SnowResult<RowSet>;

    /// Terminate the session; the connection is unusable afterwards
    async fn close(&self);
}

/// Opens warehouse sessions from tenant connection parameters
#[async_trait]
pub trait WarehouseDriver: Send + Sync {
    /// Perform the connect handshake. Fails with `Connection` when the
    /// handshake or authentication fails.
    async fn connect(
        &self,
        config: &TenantConnectionConfig,
    ) -> SnowResult<Arc<dyn WarehouseConnection>>;
}
