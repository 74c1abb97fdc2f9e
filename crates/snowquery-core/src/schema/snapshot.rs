//! Introspected schema snapshot types
//!
//! A snapshot is the raw, point-in-time enumeration of a tenant's tables
//! and columns. It persists through the metadata store as a plain JSON
//! document, versioned implicitly by its capture timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One column as reported by the warehouse's information schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    /// Declared warehouse type (e.g. `NUMBER`, `VARCHAR`)
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    #[serde(default)]
    pub comment: String,
}

/// One table or view as reported by the warehouse's information schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    /// Owning schema within the database
    pub schema: String,
    /// Table kind as reported by the warehouse (`BASE TABLE`, `VIEW`)
    #[serde(rename = "type")]
    pub table_type: String,
    #[serde(default)]
    pub comment: String,
    /// Approximate row count; zero when the count query was unavailable
    #[serde(default)]
    pub row_count: u64,
    pub columns: Vec<ColumnSchema>,
}

/// The full set of tables for a tenant at a point in time.
///
/// A snapshot is either fully introspected or not used at all: partial
/// introspection failures abort the refresh rather than caching a
/// partial result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableSchema>,
    pub captured_at: DateTime<Utc>,
}

impl SchemaSnapshot {
    /// Create a snapshot stamped with the current time
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self {
            tables,
            captured_at: Utc::now(),
        }
    }

    /// Age of this snapshot relative to now
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.captured_at
    }

    /// Whether the snapshot is older than `ttl_secs`
    pub fn is_stale(&self, ttl_secs: i64) -> bool {
        self.age() > chrono::Duration::seconds(ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_json_shape_round_trips() {
        let snapshot = SchemaSnapshot::new(vec![TableSchema {
            name: "MEMBERS".to_string(),
            schema: "PUBLIC".to_string(),
            table_type: "BASE TABLE".to_string(),
            comment: "Enrolled members".to_string(),
            row_count: 42,
            columns: vec![ColumnSchema {
                name: "MEMBER_ID".to_string(),
                data_type: "NUMBER".to_string(),
                nullable: false,
                comment: String::new(),
            }],
        }]);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["tables"][0]["name"], "MEMBERS");
        assert_eq!(json["tables"][0]["type"], "BASE TABLE");
        assert_eq!(json["tables"][0]["columns"][0]["type"], "NUMBER");

        let back: SchemaSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back.tables[0].columns.len(), 1);
    }

    #[test]
    fn fresh_snapshot_is_not_stale() {
        let snapshot = SchemaSnapshot::new(vec![]);
        assert!(!snapshot.is_stale(3600));
    }

    #[test]
    fn old_snapshot_is_stale() {
        let mut snapshot = SchemaSnapshot::new(vec![]);
        snapshot.captured_at = Utc::now() - chrono::Duration::hours(2);
        assert!(snapshot.is_stale(3600));
    }
}
