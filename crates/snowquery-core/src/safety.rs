//! Static SQL safety validation
//!
//! A deliberately conservative textual filter, not a parser: the
//! statement must read as a single SELECT/WITH, and no write/DDL
//! keyword may appear anywhere in the text as a whole word. Known
//! limitations: a keyword inside a quoted string literal or identifier
//! is still rejected (false positive), and multi-statement injection
//! hidden behind comment tricks outside the keyword list is not caught.
//! An AST-based single-statement check is the documented hardening path.

use crate::error::{SnowError, SnowResult};
use once_cell::sync::Lazy;
use regex::Regex;

/// Keywords rejected anywhere in the statement text
pub const FORBIDDEN_KEYWORDS: [&str; 11] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "EXEC", "EXECUTE",
    "GRANT", "REVOKE",
];

static KEYWORD_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    FORBIDDEN_KEYWORDS
        .iter()
        .map(|kw| {
            (
                *kw,
                Regex::new(&format!(r"(?i)\b{kw}\b")).expect("keyword pattern compiles"),
            )
        })
        .collect()
});

pub struct SafetyValidator;

impl SafetyValidator {
    /// Reject anything that is not a single read-only statement.
    pub fn validate(sql: &str) -> SnowResult<()> {
        let normalized = sql.trim().to_uppercase();
        if !normalized.starts_with("SELECT") && !normalized.starts_with("WITH") {
            // Name the keyword when there is one; a bare "SHOW TABLES"
            // still gets the generic rejection.
            if let Some(keyword) = first_forbidden_keyword(sql) {
                return Err(SnowError::unsafe_query(format!(
                    "Query contains forbidden keyword: {keyword}"
                )));
            }
            return Err(SnowError::unsafe_query("Only SELECT queries are allowed."));
        }

        if let Some(keyword) = first_forbidden_keyword(sql) {
            return Err(SnowError::unsafe_query(format!(
                "Query contains forbidden keyword: {keyword}"
            )));
        }

        Ok(())
    }
}

/// First blocked keyword appearing as a whole word anywhere in the raw
/// (non-normalized) text.
fn first_forbidden_keyword(sql: &str) -> Option<&'static str> {
    KEYWORD_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(sql))
        .map(|(keyword, _)| *keyword)
}
