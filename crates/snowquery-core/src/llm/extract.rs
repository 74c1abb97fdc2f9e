//! Robust JSON extraction from model responses
//!
//! Models asked for JSON-only output still wrap it in markdown fences
//! or conversational prose often enough that the translator cannot rely
//! on a clean body. Extraction handles, in order: raw JSON, fenced code
//! blocks, and prose with one embedded `{...}` object.

use serde_json::Value;

/// Extract the first top-level JSON object from raw model text.
///
/// Returns `None` when no parseable object is present; the caller owns
/// retry policy.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut cleaned = trimmed.to_string();

    // Strip a markdown code fence (```json ... ``` or ``` ... ```).
    if cleaned.starts_with("```") {
        let mut lines: Vec<&str> = cleaned.lines().collect();
        lines.remove(0);
        if lines.last().map(|l| l.trim()) == Some("```") {
            lines.pop();
        }
        cleaned = lines.join("\n").trim().to_string();
    }

    // Tolerate preamble/postamble around one object: take the span from
    // the first `{` to the last `}`.
    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            cleaned = cleaned[start..=end].to_string();
        }
    }

    serde_json::from_str::<Value>(&cleaned)
        .ok()
        .filter(|v| v.is_object())
}
