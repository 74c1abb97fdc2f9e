//! Warehouse schema introspection
//!
//! Enumerates tables and columns through the warehouse's information
//! schema. A refresh is all-or-nothing: any metadata query failure
//! aborts the snapshot, except row counts, which degrade to zero.

use crate::error::{SnowError, SnowResult};
use crate::schema::snapshot::{ColumnSchema, SchemaSnapshot, TableSchema};
use crate::warehouse::driver::{RowSet, WarehouseConnection, WarehouseValue};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Introspect every configured schema into one snapshot.
    #[instrument(skip(connection))]
    pub async fn introspect(
        connection: &Arc<dyn WarehouseConnection>,
        database: &str,
        schemas: &[String],
    ) -> SnowResult<SchemaSnapshot> {
        let mut tables = Vec::new();
        for schema in schemas {
            tables.extend(Self::introspect_schema(connection, database, schema).await?);
        }
        debug!(table_count = tables.len(), "schema introspection complete");
        Ok(SchemaSnapshot::new(tables))
    }

    async fn introspect_schema(
        connection: &Arc<dyn WarehouseConnection>,
        database: &str,
        schema: &str,
    ) -> SnowResult<Vec<TableSchema>> {
        let table_rows = connection
            .execute(&format!(
                "SELECT TABLE_NAME, TABLE_TYPE, COMMENT \
                 FROM {database}.INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_SCHEMA = '{schema}' \
                 ORDER BY TABLE_NAME"
            ))
            .await
            .map_err(|e| SnowError::introspection(format!("table listing failed: {e}")))?;

        let listed: Vec<(String, String, String)> = (0..table_rows.rows.len())
            .map(|i| {
                (
                    cell_text(&table_rows, i, "TABLE_NAME"),
                    cell_text(&table_rows, i, "TABLE_TYPE"),
                    cell_text(&table_rows, i, "COMMENT"),
                )
            })
            .collect();

        // Column and row-count fetches for the schema's tables run
        // concurrently to bound wall-clock time on wide schemas.
        try_join_all(listed.into_iter().map(|(name, table_type, comment)| {
            let connection = connection.clone();
            let database = database.to_string();
            let schema = schema.to_string();
            async move {
                let columns = Self::fetch_columns(&connection, &database, &schema, &name).await?;
                let row_count = Self::fetch_row_count(&connection, &database, &schema, &name).await;
                Ok::<_, SnowError>(TableSchema {
                    name,
                    schema,
                    table_type,
                    comment,
                    row_count,
                    columns,
                })
            }
        }))
        .await
    }

    async fn fetch_columns(
        connection: &Arc<dyn WarehouseConnection>,
        database: &str,
        schema: &str,
        table: &str,
    ) -> SnowResult<Vec<ColumnSchema>> {
        let rows = connection
            .execute(&format!(
                "SELECT COLUMN_NAME, DATA_TYPE, IS_NULLABLE, COMMENT \
                 FROM {database}.INFORMATION_SCHEMA.COLUMNS \
                 WHERE TABLE_SCHEMA = '{schema}' AND TABLE_NAME = '{table}' \
                 ORDER BY ORDINAL_POSITION"
            ))
            .await
            .map_err(|e| {
                SnowError::introspection(format!("column listing for {table} failed: {e}"))
            })?;

        Ok((0..rows.rows.len())
            .map(|i| ColumnSchema {
                name: cell_text(&rows, i, "COLUMN_NAME"),
                data_type: cell_text(&rows, i, "DATA_TYPE"),
                nullable: cell_text(&rows, i, "IS_NULLABLE") == "YES",
                comment: cell_text(&rows, i, "COMMENT"),
            })
            .collect())
    }

    /// Approximate row count; unavailability is tolerated as zero.
    async fn fetch_row_count(
        connection: &Arc<dyn WarehouseConnection>,
        database: &str,
        schema: &str,
        table: &str,
    ) -> u64 {
        let result = connection
            .execute(&format!(
                "SELECT COUNT(*) AS CNT FROM {database}.{schema}.\"{table}\""
            ))
            .await;
        match result {
            Ok(rows) => match rows.cell(0, "CNT") {
                Some(WarehouseValue::Int(n)) => (*n).max(0) as u64,
                Some(WarehouseValue::Text(t)) => t.parse().unwrap_or(0),
                _ => 0,
            },
            Err(e) => {
                warn!(table, "row count unavailable: {e}");
                0
            }
        }
    }
}

fn cell_text(rows: &RowSet, row: usize, column: &str) -> String {
    match rows.cell(row, column) {
        Some(WarehouseValue::Text(t)) => t.clone(),
        Some(WarehouseValue::Int(n)) => n.to_string(),
        Some(WarehouseValue::Float(f)) => f.to_string(),
        Some(WarehouseValue::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}
