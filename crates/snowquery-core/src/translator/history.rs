//! Bounded conversation-history summarization
//!
//! The caller supplies prior turns on every call (the core is stateless
//! across calls). Only the last three question/answer pairs reach the
//! model, and each prior assistant turn is reduced to a short textual
//! summary instead of its original structured JSON; the model needs
//! the gist for follow-up questions, not the full result set.

use crate::llm::messages::ChatMessage;
use crate::pipeline::response::QueryResponse;
use serde::{Deserialize, Serialize};

/// Last 3 question/answer pairs
pub const HISTORY_WINDOW_TURNS: usize = 6;

/// One prior turn of the conversation, supplied read-only by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ConversationTurn {
    User { text: String },
    Assistant { response: QueryResponse },
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn assistant(response: QueryResponse) -> Self {
        Self::Assistant { response }
    }
}

/// Convert the history window into model messages.
///
/// Turns outside the window are discarded; assistant turns that carry
/// neither SQL nor an error contribute nothing.
pub fn history_messages(history: &[ConversationTurn]) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(HISTORY_WINDOW_TURNS);
    history[start..]
        .iter()
        .filter_map(|turn| match turn {
            ConversationTurn::User { text } if !text.trim().is_empty() => {
                Some(ChatMessage::user(text.clone()))
            }
            ConversationTurn::User { .. } => None,
            ConversationTurn::Assistant { response } => {
                summarize_response(response).map(ChatMessage::assistant)
            }
        })
        .collect()
}

/// Pure summary of one prior answer.
pub fn summarize_response(response: &QueryResponse) -> Option<String> {
    if let Some(error) = &response.error {
        return Some(format!("I encountered an error: {error}"));
    }
    let sql = response.sql.as_ref()?;

    let mut summary = format!("I generated this SQL:\n{sql}");
    if let Some(explanation) = &response.explanation {
        summary.push_str(&format!("\n\nExplanation: {explanation}"));
    }
    let plural = if response.row_count == 1 { "" } else { "s" };
    summary.push_str(&format!(
        "\n\nQuery returned {} row{plural}.",
        response.row_count
    ));
    Some(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::messages::ChatRole;

    fn answered(sql: &str, rows: usize) -> QueryResponse {
        QueryResponse {
            question: "q".to_string(),
            sql: Some(sql.to_string()),
            explanation: Some("counts things".to_string()),
            row_count: rows,
            ..Default::default()
        }
    }

    #[test]
    fn error_turns_render_the_error_text() {
        let response = QueryResponse {
            error: Some("no such column".to_string()),
            ..Default::default()
        };
        assert_eq!(
            summarize_response(&response).unwrap(),
            "I encountered an error: no such column"
        );
    }

    #[test]
    fn sql_turns_render_sql_explanation_and_row_count() {
        let summary = summarize_response(&answered("SELECT 1", 1)).unwrap();
        assert!(summary.contains("I generated this SQL:\nSELECT 1"));
        assert!(summary.contains("Explanation: counts things"));
        assert!(summary.ends_with("Query returned 1 row."));

        let summary = summarize_response(&answered("SELECT 1", 3)).unwrap();
        assert!(summary.ends_with("Query returned 3 rows."));
    }

    #[test]
    fn empty_answers_contribute_nothing() {
        assert!(summarize_response(&QueryResponse::default()).is_none());
    }

    #[test]
    fn only_the_last_three_pairs_survive() {
        let mut history = Vec::new();
        for i in 0..5 {
            history.push(ConversationTurn::user(format!("question {i}")));
            history.push(ConversationTurn::assistant(answered("SELECT 1", i)));
        }

        let messages = history_messages(&history);
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[0].content, "question 2");
    }

    #[test]
    fn blank_user_turns_are_skipped() {
        let history = vec![
            ConversationTurn::user("  "),
            ConversationTurn::user("real question"),
        ];
        let messages = history_messages(&history);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "real question");
    }
}
