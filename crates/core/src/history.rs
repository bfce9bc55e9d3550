//! History traits: the chat log and the conversation store.
//!
//! History is kept twice:
//! - a [`ChatLog`]: every turn, in append order, as one human-readable
//!   document. This is the canonical record.
//! - a [`ConversationStore`]: one row per completed (prompt, response)
//!   exchange, keyed by conversation id, for search and lookup.
//!
//! The log views (`last_n`, `continue_last`, `load_by_id`, ...) are pure
//! slicing over the loaded sequence, so they are provided here once and
//! every log backend only has to implement `load` and `append`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::HistoryError;
use crate::turn::{ConversationId, Role, Turn};

/// One completed exchange as stored in the relational mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRow {
    pub prompt: String,
    pub response: String,
    pub model_name: String,
    pub timestamp: DateTime<Utc>,
    pub temperature: f32,
    pub input_tokens: i32,
    pub output_tokens: i32,
    #[serde(rename = "conv_id")]
    pub conversation_id: ConversationId,
}

impl ConversationRow {
    /// Expand the row into its user turn followed by its assistant turn.
    ///
    /// The user turn carries the row's input tokens and zero output tokens;
    /// the assistant turn carries both measured values. Nothing is
    /// re-estimated from content.
    pub fn into_turns(self) -> [Turn; 2] {
        let user = Turn {
            role: Role::User,
            content: self.prompt,
            model: self.model_name.clone(),
            timestamp: self.timestamp,
            is_conversation_start: false,
            input_tokens: self.input_tokens,
            output_tokens: 0,
            conversation_id: self.conversation_id,
        };
        let assistant = Turn {
            role: Role::Assistant,
            content: self.response,
            model: self.model_name,
            timestamp: self.timestamp,
            is_conversation_start: false,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            conversation_id: self.conversation_id,
        };
        [user, assistant]
    }
}

/// The append-only, fully-rewritten record of every turn.
///
/// Implementations: YAML file (production). Not safe for concurrent writers
/// across processes.
#[async_trait]
pub trait ChatLog: Send + Sync {
    /// Where the log lives (path or label), for messages.
    fn location(&self) -> String;

    /// Read the whole log. An empty or absent document is an empty sequence.
    async fn load(&self) -> Result<Vec<Turn>, HistoryError>;

    /// Append one turn by rewriting the whole document.
    async fn append(&self, turn: Turn) -> Result<(), HistoryError>;

    /// Append `turn` with its start marker set unless the exchange continues
    /// an open thread, so both turns of an opening exchange carry it.
    async fn record(&self, turn: Turn, continuing: bool) -> Result<Turn, HistoryError> {
        let turn = turn.starting_conversation(!continuing);
        self.append(turn.clone()).await?;
        Ok(turn)
    }

    /// The final `n` turns.
    async fn last_n(&self, n: i64) -> Result<Vec<Turn>, HistoryError> {
        let turns = self.load().await?;
        last_n(&turns, n).map(<[Turn]>::to_vec)
    }

    /// The still-open thread: from the seed prompt of the latest start marker to the end.
    async fn continue_last(&self) -> Result<Vec<Turn>, HistoryError> {
        let turns = self.load().await?;
        continue_last(&turns).map(<[Turn]>::to_vec)
    }

    /// The highest conversation id in the log, or `None` when the log is empty.
    async fn find_last_conversation_id(&self) -> Result<Option<ConversationId>, HistoryError> {
        let turns = self.load().await?;
        Ok(find_last_conversation_id(&turns))
    }

    /// Every turn of one conversation, in log order.
    async fn load_by_id(&self, id: ConversationId) -> Result<Vec<Turn>, HistoryError> {
        let turns = self.load().await?;
        load_by_id(turns, id)
    }
}

/// The queryable mirror: one row per completed exchange.
///
/// Implementations: SQLite (production), in-memory (testing).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Append one row. Callers treat failures as non-fatal.
    async fn insert(&self, row: ConversationRow) -> Result<(), HistoryError>;

    /// Every row for `id`, in insertion order.
    async fn rows_for(&self, id: ConversationId) -> Result<Vec<ConversationRow>, HistoryError>;

    /// Ids of conversations whose response text contains `keyword`,
    /// each id once, in first-seen order.
    async fn search(&self, keyword: &str) -> Result<Vec<ConversationId>, HistoryError>;

    /// Total row count.
    async fn count(&self) -> Result<usize, HistoryError>;

    /// The conversation expanded into alternating user/assistant turns.
    async fn load_by_id(&self, id: ConversationId) -> Result<Vec<Turn>, HistoryError> {
        let rows = self.rows_for(id).await?;
        Ok(rows.into_iter().flat_map(ConversationRow::into_turns).collect())
    }

    /// The model recorded for `id`; the last row scanned wins.
    async fn model_of(&self, id: ConversationId) -> Result<Option<String>, HistoryError> {
        let rows = self.rows_for(id).await?;
        Ok(rows.into_iter().last().map(|r| r.model_name))
    }
}

// ── Log views over a loaded sequence ─────────────────────────────────────

/// The final `n` turns. Rejects `n <= 0` and `n >= turns.len()`: asking for
/// everything is treated as a caller error rather than clamped.
pub fn last_n(turns: &[Turn], n: i64) -> Result<&[Turn], HistoryError> {
    let total = turns.len();
    if n <= 0 || n as u64 >= total as u64 {
        return Err(HistoryError::InvalidRange {
            requested: n,
            available: total,
        });
    }
    Ok(&turns[total - n as usize..])
}

/// Slice from one position before the latest `is_conversation_start` turn
/// through the end.
///
/// Both turns of an opening exchange carry the marker, so the latest marked
/// turn is the assistant reply and the position before it is the prompt that
/// seeded the thread. A marker at index 0, or no marker at all, yields the
/// whole log.
pub fn continue_last(turns: &[Turn]) -> Result<&[Turn], HistoryError> {
    if turns.is_empty() {
        return Err(HistoryError::EmptyHistory);
    }
    let marker = turns
        .iter()
        .rposition(|t| t.is_conversation_start)
        .unwrap_or(0);
    Ok(&turns[marker.saturating_sub(1)..])
}

pub fn find_last_conversation_id(turns: &[Turn]) -> Option<ConversationId> {
    turns.iter().map(|t| t.conversation_id).max()
}

pub fn load_by_id(turns: Vec<Turn>, id: ConversationId) -> Result<Vec<Turn>, HistoryError> {
    let matching: Vec<Turn> = turns
        .into_iter()
        .filter(|t| t.conversation_id == id)
        .collect();
    if matching.is_empty() {
        return Err(HistoryError::NotFound(id.0));
    }
    Ok(matching)
}
