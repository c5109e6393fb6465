//! The conversation log shown in the chat window.
//!
//! Settled turns live in an append-only list of reference-counted entries, so
//! cloning the log for rendering is cheap and toggling one answer only
//! reallocates that answer. The in-progress indicator is not part of that list:
//! it is a separate optional slot that always renders after the last turn.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Identifier of a log entry. Allocated from one counter per conversation, so
/// ids only ever grow and are never reused, including for thinking entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(u64);

/// Tabular result of an executed query, as sent by the backend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResultSet {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default, rename = "data")]
    pub rows: Vec<Map<String, Value>>,
}

/// A successful answer from the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Answer {
    pub sql: Option<String>,
    pub result: Option<ResultSet>,
    pub explanation: Option<String>,
    pub reasoning: Vec<String>,
    /// Whether the reasoning trace is expanded. The only field that changes
    /// after the answer is appended.
    pub details_visible: bool,
}

impl Answer {
    pub fn new(
        sql: Option<String>,
        result: Option<ResultSet>,
        explanation: Option<String>,
        reasoning: Vec<String>,
    ) -> Self {
        Self {
            sql,
            result,
            explanation,
            reasoning,
            details_visible: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnBody {
    User { content: String },
    Answer(Answer),
    /// A settled system turn carrying only a human-readable failure.
    Error { content: String },
}

impl TurnBody {
    pub fn user(content: impl Into<String>) -> Self {
        TurnBody::User {
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        TurnBody::Error {
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub id: MessageId,
    pub body: TurnBody,
}

/// The transient "thinking" indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct Thinking {
    pub id: MessageId,
    pub content: String,
}

/// One renderable entry, in display order.
#[derive(Debug, Clone, Copy)]
pub enum Entry<'a> {
    Turn(&'a Turn),
    Thinking(&'a Thinking),
}

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Arc<Turn>>,
    thinking: Option<Thinking>,
    next_id: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> MessageId {
        self.next_id += 1;
        MessageId(self.next_id)
    }

    /// Append a settled turn to the tail of the log.
    ///
    /// The thinking indicator must already be gone: a settled turn is never
    /// appended while an indicator is showing.
    pub fn append(&mut self, body: TurnBody) -> MessageId {
        debug_assert!(
            self.thinking.is_none(),
            "settled turn appended while a thinking indicator is showing"
        );
        let id = self.allocate_id();
        self.turns.push(Arc::new(Turn { id, body }));
        id
    }

    /// Show `content` as the thinking indicator, replacing any previous one.
    pub fn show_thinking(&mut self, content: impl Into<String>) -> MessageId {
        let id = self.allocate_id();
        self.thinking = Some(Thinking {
            id,
            content: content.into(),
        });
        id
    }

    /// Drop the thinking indicator. Returns whether one was showing.
    pub fn remove_transient(&mut self) -> bool {
        self.thinking.take().is_some()
    }

    /// Flip `details_visible` on the answer with `id`.
    ///
    /// Every other entry keeps its allocation. Returns false if `id` does not
    /// name an answer.
    pub fn toggle_details(&mut self, id: MessageId) -> bool {
        let Ok(index) = self.turns.binary_search_by_key(&id, |turn| turn.id) else {
            return false;
        };
        let turn = &mut self.turns[index];
        let TurnBody::Answer(answer) = &turn.body else {
            return false;
        };
        let mut answer = answer.clone();
        answer.details_visible = !answer.details_visible;
        *turn = Arc::new(Turn {
            id,
            body: TurnBody::Answer(answer),
        });
        true
    }

    pub fn turns(&self) -> &[Arc<Turn>] {
        &self.turns
    }

    #[allow(dead_code)]
    pub fn thinking(&self) -> Option<&Thinking> {
        self.thinking.as_ref()
    }

    pub fn get(&self, id: MessageId) -> Option<&Turn> {
        self.turns
            .binary_search_by_key(&id, |turn| turn.id)
            .ok()
            .map(|index| self.turns[index].as_ref())
    }

    /// Entries in display order; the indicator, if any, comes last.
    pub fn entries(&self) -> impl Iterator<Item = Entry<'_>> {
        self.turns
            .iter()
            .map(|turn| Entry::Turn(turn.as_ref()))
            .chain(self.thinking.iter().map(Entry::Thinking))
    }

    /// Number of displayed entries, indicator included.
    pub fn len(&self) -> usize {
        self.turns.len() + usize::from(self.thinking.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
