//! Curated metadata overlay types
//!
//! The metadata store carries human-authored descriptions layered on top
//! of the raw introspected schema. List- and map-shaped fields arrive as
//! opaque JSON strings edited out-of-band; they are parsed defensively at
//! this boundary, and a malformed value degrades to "absent" rather than
//! failing the request.

use serde::{Deserialize, Serialize};

/// A domain term from the business glossary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessTerm {
    pub term: String,
    pub definition: Option<String>,
    /// SQL expression the term maps to
    pub sql_mapping: Option<String>,
    /// JSON array of table names, stored raw
    pub related_tables: Option<String>,
}

impl BusinessTerm {
    /// Parsed related-table list; empty on absent or malformed input
    pub fn related_table_names(&self) -> Vec<String> {
        parse_string_list(self.related_tables.as_deref())
    }
}

/// A documented join path out of a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinHint {
    pub table: String,
    /// Join predicate, e.g. `a.MEMBER_ID = b.MEMBER_ID`
    pub on: String,
    /// Join kind (`LEFT JOIN`, `INNER JOIN`); generic `JOIN` when unset
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// A worked question → SQL example pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamplePair {
    pub question: String,
    pub sql: String,
}

/// Curated overlay for one column
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnOverlay {
    pub column_name: String,
    pub description: Option<String>,
    /// Unit of measure, appended to the description
    pub unit: Option<String>,
    /// How a derived column is computed
    pub computed_logic: Option<String>,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_foreign_key: bool,
    /// Target of the foreign key, e.g. `MEMBERS.MEMBER_ID`
    pub foreign_key_ref: Option<String>,
    /// JSON array of alternate names, stored raw
    pub synonyms: Option<String>,
    /// JSON array of representative values, stored raw
    pub sample_values: Option<String>,
    /// JSON object mapping stored codes to labels, stored raw
    pub value_mapping: Option<String>,
}

impl ColumnOverlay {
    /// Parsed synonym list; empty on absent or malformed input
    pub fn synonym_list(&self) -> Vec<String> {
        parse_string_list(self.synonyms.as_deref())
    }

    /// Parsed sample values; empty on absent or malformed input
    pub fn sample_value_list(&self) -> Vec<String> {
        parse_string_list(self.sample_values.as_deref())
    }

    /// Parsed code → label pairs; empty on absent or malformed input
    pub fn value_mapping_pairs(&self) -> Vec<(String, String)> {
        let Some(raw) = self.value_mapping.as_deref() else {
            return Vec::new();
        };
        serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw)
            .map(|map| {
                map.into_iter()
                    .map(|(code, label)| (code, json_scalar_to_string(&label)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Curated overlay for one table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableOverlay {
    pub table_name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    /// What one row represents
    pub grain_description: Option<String>,
    pub data_source: Option<String>,
    pub update_frequency: Option<String>,
    pub important_notes: Option<String>,
    /// JSON array of [`JoinHint`] objects, stored raw
    pub common_joins: Option<String>,
    /// JSON array of filter expressions, stored raw
    pub common_filters: Option<String>,
    /// JSON array of [`ExamplePair`] objects, stored raw
    pub sample_queries: Option<String>,
    pub columns: Vec<ColumnOverlay>,
}

impl TableOverlay {
    /// Parsed join hints; empty on absent or malformed input
    pub fn join_hints(&self) -> Vec<JoinHint> {
        parse_typed_list(self.common_joins.as_deref())
    }

    /// Parsed filter expressions; empty on absent or malformed input
    pub fn filter_list(&self) -> Vec<String> {
        parse_string_list(self.common_filters.as_deref())
    }

    /// Parsed example pairs; empty on absent or malformed input
    pub fn example_pairs(&self) -> Vec<ExamplePair> {
        parse_typed_list(self.sample_queries.as_deref())
    }

    /// Look up the overlay for a column by its raw name
    pub fn column(&self, name: &str) -> Option<&ColumnOverlay> {
        self.columns.iter().find(|c| c.column_name == name)
    }
}

fn parse_string_list(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|r| serde_json::from_str::<Vec<serde_json::Value>>(r).ok())
        .map(|values| values.iter().map(json_scalar_to_string).collect())
        .unwrap_or_default()
}

fn parse_typed_list<T: serde::de::DeserializeOwned>(raw: Option<&str>) -> Vec<T> {
    raw.and_then(|r| serde_json::from_str::<Vec<T>>(r).ok())
        .unwrap_or_default()
}

fn json_scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
