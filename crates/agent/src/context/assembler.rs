//! Context assembly: decide which prior turns ground the next prompt.
//!
//! # Sources (first match wins)
//!
//! | Request | Source | Model pinned from history |
//! |---------|--------|---------------------------|
//! | explicit conversation id | conversation store | yes |
//! | continue last | chat log, from the latest start marker | yes |
//! | last N turns | chat log tail | no |
//! | nothing | empty | no |
//!
//! Pinning means the assembled model is the one recorded on the final loaded
//! turn, unless the caller overrode the model.
//!
//! A load failure never aborts the session: the context comes back empty and
//! the error rides along in [`AssembledContext::error`] for the caller to
//! report.

use askollama_core::error::HistoryError;
use askollama_core::history::{ChatLog, ConversationStore};
use askollama_core::turn::{ConversationId, Turn};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

// ── Types ─────────────────────────────────────────────────────────────────

/// What the caller asked for.
#[derive(Debug, Clone, Default)]
pub struct ContextRequest {
    pub conversation_id: Option<ConversationId>,
    pub continue_last: bool,
    /// Number of trailing log turns; `None` or `Some(0)` means not requested.
    pub last_n: Option<i64>,
    /// Model named explicitly by the user; disables pinning.
    pub model_override: Option<String>,
}

/// Where the assembled turns came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    Conversation(ConversationId),
    ContinueLast,
    LastN(i64),
    Fresh,
}

impl fmt::Display for ContextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversation(id) => write!(f, "conversation {id}"),
            Self::ContinueLast => f.write_str("continued conversation"),
            Self::LastN(n) => write!(f, "last {n} turns"),
            Self::Fresh => f.write_str("fresh"),
        }
    }
}

/// The result of assembly: turns to send, the model to send them to.
#[derive(Debug)]
pub struct AssembledContext {
    pub turns: Vec<Turn>,
    pub model: String,
    pub source: ContextSource,
    /// The load failure, if the source could not be read.
    pub error: Option<HistoryError>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// The id for the next exchange, and the log failure hit while choosing it.
#[derive(Debug)]
pub struct AssignedId {
    pub id: ConversationId,
    /// Set when the log could not be read; the id was then based on 0.
    pub error: Option<HistoryError>,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// Reads the chat log and the conversation store to build a context.
pub struct ContextAssembler {
    log: Arc<dyn ChatLog>,
    store: Arc<dyn ConversationStore>,
    default_model: String,
}

impl ContextAssembler {
    pub fn new(
        log: Arc<dyn ChatLog>,
        store: Arc<dyn ConversationStore>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            log,
            store,
            default_model: default_model.into(),
        }
    }

    /// Assemble the context for `request`.
    pub async fn assemble(&self, request: &ContextRequest) -> AssembledContext {
        let (source, loaded) = if let Some(id) = request.conversation_id {
            // An explicit id wins even when continue is also set
            let loaded = match self.store.load_by_id(id).await {
                Ok(turns) if turns.is_empty() => Err(HistoryError::NotFound(id.0)),
                other => other,
            };
            (ContextSource::Conversation(id), loaded)
        } else if request.continue_last {
            (ContextSource::ContinueLast, self.log.continue_last().await)
        } else if let Some(n) = request.last_n.filter(|n| *n != 0) {
            (ContextSource::LastN(n), self.log.last_n(n).await)
        } else {
            (ContextSource::Fresh, Ok(Vec::new()))
        };

        let (turns, error) = match loaded {
            Ok(turns) => (turns, None),
            Err(e) => {
                warn!(source = %source, error = %e, "Failed to load context, starting empty");
                (Vec::new(), Some(e))
            }
        };

        let pins_model = matches!(
            source,
            ContextSource::Conversation(_) | ContextSource::ContinueLast
        );
        let model = match &request.model_override {
            Some(model) => model.clone(),
            None if pins_model => turns
                .last()
                .map(|t| t.model.as_str())
                .filter(|m| !m.is_empty())
                .unwrap_or(self.default_model.as_str())
                .to_string(),
            None => self.default_model.clone(),
        };

        debug!(source = %source, turns = turns.len(), model = %model, "Context assembled");
        AssembledContext {
            turns,
            model,
            source,
            error,
        }
    }

    /// Pick the conversation id for the next exchange.
    ///
    /// An explicit id is used as-is. Otherwise the highest id in the log is
    /// reused when continuing, or incremented for a new conversation; an
    /// empty or unreadable log counts as id 0.
    pub async fn assign_conversation_id(
        &self,
        explicit: Option<ConversationId>,
        continuing: bool,
    ) -> AssignedId {
        if let Some(id) = explicit {
            return AssignedId { id, error: None };
        }
        let (base, error) = match self.log.find_last_conversation_id().await {
            Ok(last) => (last.unwrap_or_default(), None),
            Err(e) => {
                warn!(log = %self.log.location(), error = %e, "Cannot read last conversation id");
                (ConversationId::default(), Some(e))
            }
        };
        let id = if continuing { base } else { base.next() };
        AssignedId { id, error }
    }
}
