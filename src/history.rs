//! Conversation history sent along with each question.

use serde::{Deserialize, Serialize};

use crate::conversation::{Conversation, TurnBody};

/// How settled turns are reduced into outgoing history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryPolicy {
    /// Only the user's own questions.
    Simple,
    /// Questions plus each system turn's SQL (or error text).
    #[default]
    Rich,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in the outgoing history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

impl HistoryMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Project the settled turns of `conversation` into request history.
///
/// The thinking indicator is never part of the settled turns, so it cannot
/// leak here. Explanations and reasoning traces are never sent back.
pub fn project(conversation: &Conversation, policy: HistoryPolicy) -> Vec<HistoryMessage> {
    conversation
        .turns()
        .iter()
        .filter_map(|turn| match (&turn.body, policy) {
            (TurnBody::User { content }, _) => Some(HistoryMessage::user(content.as_str())),
            (_, HistoryPolicy::Simple) => None,
            (TurnBody::Answer(answer), HistoryPolicy::Rich) => Some(HistoryMessage::assistant(
                answer.sql.clone().unwrap_or_default(),
            )),
            (TurnBody::Error { content }, HistoryPolicy::Rich) => {
                Some(HistoryMessage::assistant(content.as_str()))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Answer;
    use pretty_assertions::assert_eq;

    fn sample_log() -> Conversation {
        let mut log = Conversation::new();
        log.append(TurnBody::user("How many rows?"));
        log.append(TurnBody::Answer(Answer::new(
            Some("SELECT COUNT(*) FROM data".to_string()),
            None,
            Some("Counts every row.".to_string()),
            vec!["[Simple Query Generated] SELECT COUNT(*) FROM data".to_string()],
        )));
        log.append(TurnBody::user("And per state?"));
        log.append(TurnBody::error("Error: db locked"));
        log.append(TurnBody::user("Try again"));
        log.show_thinking("Analyzing..");
        log
    }

    #[test]
    fn test_empty_log_projects_nothing() {
        let log = Conversation::new();
        assert!(project(&log, HistoryPolicy::Rich).is_empty());
        assert!(project(&log, HistoryPolicy::Simple).is_empty());
    }

    #[test]
    fn test_simple_policy_keeps_only_questions() {
        let history = project(&sample_log(), HistoryPolicy::Simple);
        assert_eq!(
            history,
            vec![
                HistoryMessage::user("How many rows?"),
                HistoryMessage::user("And per state?"),
                HistoryMessage::user("Try again"),
            ]
        );
    }

    #[test]
    fn test_rich_policy_reduces_answers_to_sql() {
        let history = project(&sample_log(), HistoryPolicy::Rich);
        assert_eq!(
            history,
            vec![
                HistoryMessage::user("How many rows?"),
                HistoryMessage::assistant("SELECT COUNT(*) FROM data"),
                HistoryMessage::user("And per state?"),
                HistoryMessage::assistant("Error: db locked"),
                HistoryMessage::user("Try again"),
            ]
        );
        assert!(history
            .iter()
            .all(|m| !m.content.contains("Counts every row") && !m.content.contains("[Simple")));
        assert!(history.iter().all(|m| !m.content.starts_with("Analyzing")));
    }

    #[test]
    fn test_answer_without_sql_sends_empty_content() {
        let mut log = Conversation::new();
        log.append(TurnBody::user("q"));
        log.append(TurnBody::Answer(Answer::new(
            None,
            None,
            Some("nothing to run".to_string()),
            Vec::new(),
        )));
        let history = project(&log, HistoryPolicy::Rich);
        assert_eq!(history[1], HistoryMessage::assistant(""));
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(HistoryMessage::assistant("SELECT 1")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "SELECT 1"}));
    }
}
