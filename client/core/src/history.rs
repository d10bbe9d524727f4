//! Conversation History
//!
//! The ordered log of turns exchanged between the user and the assistant.
//!
//! # Design Philosophy
//!
//! The history is append-only: turns are never edited once they are in the
//! log. The assistant turn of an exchange is only appended when the exchange
//! ends, so the in-progress text lives in the session (and on screen), never
//! here. The `StreamingSession` is the only writer; everything else sees the
//! history through `&ConversationHistory`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Who authored a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed by the user
    User,
    /// Text generated by the server
    Assistant,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in the conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Author of the turn
    pub role: Role,
    /// Message text
    pub content: String,
}

impl Turn {
    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Append-only, ordered log of turns
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a turn at the end of the log
    pub fn append(&mut self, turn: Turn) {
        tracing::trace!(
            role = %turn.role,
            bytes = turn.content.len(),
            position = self.turns.len(),
            "Appending turn"
        );
        self.turns.push(turn);
    }

    /// Remove every turn
    pub fn clear(&mut self) {
        tracing::debug!(removed = self.turns.len(), "Clearing conversation history");
        self.turns.clear();
    }

    /// Owned copy of the log, for transmission or export
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    /// Borrowed view of the log
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Most recent turn
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the log has no turns
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
