//! Turn and conversation identity domain types.
//!
//! A [`Turn`] is one role-tagged utterance. Every prompt the user sends and
//! every reply the backend returns becomes exactly one turn in the chat log;
//! the conversation store keeps the same data as one row per exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric identifier grouping turns into one logical conversation.
///
/// Assigned monotonically and never reused.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl ConversationId {
    /// The id that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<i64> for ConversationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a turn's author.
///
/// Logs written by older releases capitalise the role; both spellings read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user", alias = "User")]
    User,
    #[serde(rename = "assistant", alias = "Assistant")]
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The atomic unit of history.
///
/// Field names on disk follow the log schema (`new_conversation`, `conv_id`).
/// Everything but role and content defaults when absent, so a log written
/// with an older schema still loads and is upgraded on the next rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// Backend model that produced/received the turn (empty for user turns in the log)
    #[serde(default)]
    pub model: String,

    /// When the turn was durably recorded
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// True on the turns of the exchange that opened a new conversation
    #[serde(rename = "new_conversation", default)]
    pub is_conversation_start: bool,

    #[serde(default)]
    pub input_tokens: i32,

    #[serde(default)]
    pub output_tokens: i32,

    #[serde(rename = "conv_id", default)]
    pub conversation_id: ConversationId,
}

impl Turn {
    /// Create a user turn. The model is left empty, as in the log.
    pub fn user(content: impl Into<String>, conversation_id: ConversationId) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            model: String::new(),
            timestamp: Utc::now(),
            is_conversation_start: false,
            input_tokens: 0,
            output_tokens: 0,
            conversation_id,
        }
    }

    /// Create an assistant turn produced by `model`.
    pub fn assistant(
        content: impl Into<String>,
        model: impl Into<String>,
        conversation_id: ConversationId,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            model: model.into(),
            timestamp: Utc::now(),
            is_conversation_start: false,
            input_tokens: 0,
            output_tokens: 0,
            conversation_id,
        }
    }

    /// Attach token counts.
    pub fn with_tokens(mut self, input_tokens: i32, output_tokens: i32) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }

    /// Mark (or unmark) this turn as part of the exchange that opens a conversation.
    pub fn starting_conversation(mut self, start: bool) -> Self {
        self.is_conversation_start = start;
        self
    }

    /// Override the timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_turn_has_empty_model() {
        let turn = Turn::user("Hello", ConversationId(3));
        assert_eq!(turn.role, Role::User);
        assert!(turn.model.is_empty());
        assert_eq!(turn.conversation_id, ConversationId(3));
        assert!(!turn.is_conversation_start);
    }

    #[test]
    fn serialized_field_names_follow_log_schema() {
        let turn = Turn::assistant("Hi", "llama3", ConversationId(2))
            .with_tokens(10, 20)
            .starting_conversation(true);
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["new_conversation"], true);
        assert_eq!(json["conv_id"], 2);
        assert_eq!(json["input_tokens"], 10);
        assert_eq!(json["output_tokens"], 20);
    }

    #[test]
    fn capitalised_roles_are_accepted() {
        let turn: Turn = serde_json::from_str(
            r#"{"role":"User","content":"hey","timestamp":"2025-01-02T03:04:05-05:00"}"#,
        )
        .unwrap();
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.conversation_id, ConversationId(0));
        assert_eq!(turn.timestamp.to_rfc3339(), "2025-01-02T08:04:05+00:00");
    }

    #[test]
    fn conversation_id_next_and_ordering() {
        let id = ConversationId(41);
        assert_eq!(id.next(), ConversationId(42));
        assert!(ConversationId(3) > ConversationId(1));
        assert_eq!(id.to_string(), "41");
    }
}
