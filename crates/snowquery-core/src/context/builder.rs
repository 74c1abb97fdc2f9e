//! Enriched prompt context assembly
//!
//! Merges the cached raw schema with curated table/column metadata and
//! the business glossary into one formatted document. This document is
//! the single mechanism by which domain knowledge reaches the language
//! model, so everything the store knows about a table ends up here.

use crate::config::resolver::TenantConfigResolver;
use crate::error::SnowResult;
use crate::metadata::overlay::{BusinessTerm, TableOverlay};
use crate::metadata::store::MetadataStore;
use crate::schema::cache::SchemaCache;
use crate::schema::snapshot::SchemaSnapshot;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

pub struct ContextBuilder {
    resolver: Arc<TenantConfigResolver>,
    cache: Arc<SchemaCache>,
    store: Arc<dyn MetadataStore>,
}

impl ContextBuilder {
    pub fn new(
        resolver: Arc<TenantConfigResolver>,
        cache: Arc<SchemaCache>,
        store: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            resolver,
            cache,
            store,
        }
    }

    /// Assemble the full context document for a tenant.
    #[instrument(skip(self))]
    pub async fn build(&self, tenant_id: &str) -> SnowResult<String> {
        let config = self.resolver.resolve(tenant_id).await?;
        let snapshot = self.cache.get(tenant_id).await?;
        let overlays = self.store.get_table_metadata(tenant_id).await?;
        let terms = self.store.get_business_terms(tenant_id).await?;
        Ok(render_context(
            &config.database,
            config.default_schema(),
            &snapshot,
            &overlays,
            &terms,
        ))
    }
}

/// Render the enriched context document.
///
/// Layout: database/schema header, business glossary, then one section
/// per table combining raw and curated fields. Curated descriptions win
/// over raw comments; malformed curated JSON renders as absent.
pub fn render_context(
    database: &str,
    schema: &str,
    snapshot: &SchemaSnapshot,
    overlays: &[TableOverlay],
    terms: &[BusinessTerm],
) -> String {
    let by_table: HashMap<&str, &TableOverlay> = overlays
        .iter()
        .map(|o| (o.table_name.as_str(), o))
        .collect();

    let mut lines: Vec<String> = vec![
        format!("Database: {database}"),
        format!("Schema: {schema}"),
        String::new(),
    ];

    if !terms.is_empty() {
        lines.push("## Business Glossary".to_string());
        lines.push(
            "These are domain-specific terms the user may use. Map them to the correct SQL."
                .to_string(),
        );
        lines.push(String::new());
        for term in terms {
            lines.push(format!("**{}**", term.term));
            if let Some(definition) = &term.definition {
                lines.push(format!("  Definition: {definition}"));
            }
            if let Some(mapping) = &term.sql_mapping {
                lines.push(format!("  SQL: {mapping}"));
            }
            let related = term.related_table_names();
            if !related.is_empty() {
                lines.push(format!("  Tables: {}", related.join(", ")));
            }
            lines.push(String::new());
        }
    }

    lines.push("## Available Tables".to_string());
    lines.push(String::new());

    for table in &snapshot.tables {
        let meta = by_table.get(table.name.as_str()).copied();
        let display_name = meta
            .and_then(|m| m.display_name.as_deref())
            .unwrap_or(&table.name);

        lines.push(format!(
            "### {display_name} ({}) — {}, ~{} rows",
            table.name,
            table.table_type,
            format_count(table.row_count)
        ));

        let description = meta
            .and_then(|m| m.description.as_deref())
            .or(if table.comment.is_empty() {
                None
            } else {
                Some(table.comment.as_str())
            });
        if let Some(description) = description {
            lines.push(format!("**Description:** {description}"));
        }

        if let Some(meta) = meta {
            if let Some(grain) = &meta.grain_description {
                lines.push(format!("**Grain:** {grain}"));
            }
            if let Some(source) = &meta.data_source {
                lines.push(format!("**Source:** {source}"));
            }
            if let Some(freq) = &meta.update_frequency {
                lines.push(format!("**Updated:** {freq}"));
            }
            if let Some(notes) = &meta.important_notes {
                lines.push(format!("**⚠ Notes:** {notes}"));
            }

            let joins = meta.join_hints();
            if !joins.is_empty() {
                lines.push("**Common Joins:**".to_string());
                for join in joins {
                    lines.push(format!(
                        "  - {} {} ON {}",
                        join.kind.as_deref().unwrap_or("JOIN"),
                        join.table,
                        join.on
                    ));
                }
            }

            let filters = meta.filter_list();
            if !filters.is_empty() {
                lines.push(format!("**Common Filters:** {}", filters.join(" | ")));
            }
        }

        lines.push(String::new());
        lines.push("| Column | Type | Description | Synonyms | Sample Values |".to_string());
        lines.push("|--------|------|-------------|----------|---------------|".to_string());

        for column in &table.columns {
            let col_meta = meta.and_then(|m| m.column(&column.name));
            let nullable = if column.nullable { "NULL" } else { "NOT NULL" };

            let mut description = col_meta
                .and_then(|c| c.description.clone())
                .unwrap_or_else(|| column.comment.clone());
            if let Some(unit) = col_meta.and_then(|c| c.unit.as_deref()) {
                description.push_str(&format!(" ({unit})"));
            }
            if let Some(logic) = col_meta.and_then(|c| c.computed_logic.as_deref()) {
                description.push_str(&format!(" [Computed: {logic}]"));
            }
            if let Some(col_meta) = col_meta {
                if col_meta.is_foreign_key {
                    let target = col_meta.foreign_key_ref.as_deref().unwrap_or("?");
                    description = format!("🔗 FK→{target}. {description}");
                }
                if col_meta.is_primary_key {
                    description = format!("🔑 PK. {description}");
                }
            }

            let synonyms = col_meta
                .map(|c| c.synonym_list().join(", "))
                .unwrap_or_default();

            // A value-code mapping is more informative than raw samples,
            // so it wins when both are present.
            let samples = col_meta
                .map(|c| {
                    let pairs = c.value_mapping_pairs();
                    if pairs.is_empty() {
                        c.sample_value_list().join(", ")
                    } else {
                        pairs
                            .iter()
                            .map(|(code, label)| format!("{code}={label}"))
                            .collect::<Vec<_>>()
                            .join(", ")
                    }
                })
                .unwrap_or_default();

            lines.push(format!(
                "| {} | {} {} | {} | {} | {} |",
                column.name, column.data_type, nullable, description, synonyms, samples
            ));
        }

        if let Some(meta) = meta {
            let examples = meta.example_pairs();
            if !examples.is_empty() {
                lines.push(String::new());
                lines.push("**Example queries:**".to_string());
                for example in examples {
                    lines.push(format!("  Q: \"{}\"", example.question));
                    lines.push(format!("  SQL: {}", example.sql));
                }
            }
        }

        lines.push(String::new());
    }

    lines.join("\n")
}

/// Compact schema-only listing, without curated metadata. Used for
/// diagnostics and admin display where the full context document is
/// overkill.
pub fn render_schema_summary(database: &str, schema: &str, snapshot: &SchemaSnapshot) -> String {
    let mut lines = vec![
        format!("Database: {database}"),
        format!("Schema: {schema}"),
        String::new(),
        "Available tables:".to_string(),
        String::new(),
    ];

    for table in &snapshot.tables {
        lines.push(format!(
            "### {} ({}, ~{} rows)",
            table.name,
            table.table_type,
            format_count(table.row_count)
        ));
        if !table.comment.is_empty() {
            lines.push(format!("  Description: {}", table.comment));
        }
        for column in &table.columns {
            let nullable = if column.nullable { "NULL" } else { "NOT NULL" };
            let comment = if column.comment.is_empty() {
                String::new()
            } else {
                format!(" -- {}", column.comment)
            };
            lines.push(format!(
                "  - {} ({}, {nullable}){comment}",
                column.name, column.data_type
            ));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Thousands-separated row count
fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
