//! The chat session: one exchange at a time against the backend.
//!
//! An exchange:
//! 1. log the user turn (estimated tokens, start marker unless continuing)
//! 2. ask the provider, sending the current context
//! 3. log the assistant turn with the reported token counts
//! 4. mirror the pair into the conversation store (best effort)
//! 5. switch to continuing and reload the open thread from the log
//!
//! A backend failure ends the exchange after step 1; the user turn stays in
//! the log. Log and store failures never end an exchange: they are returned
//! as warnings alongside the reply.

use crate::context::token::{estimate_tokens, estimate_turns_tokens, max_tokens_budget};
use askollama_config::AppConfig;
use askollama_core::error::{Error, HistoryError};
use askollama_core::history::{ChatLog, ConversationRow, ConversationStore};
use askollama_core::provider::{Provider, ProviderRequest};
use askollama_core::turn::{ConversationId, Turn};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-request knobs that do not change during a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub system_prompt: String,
    pub temperature: f32,
    /// Reply allowance added to the estimated input when budgeting.
    pub max_tokens: u32,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            system_prompt: config.model.system_prompt.clone(),
            temperature: config.model.temperature,
            max_tokens: config.model.max_tokens,
        }
    }
}

/// What one successful exchange produced.
#[derive(Debug)]
pub struct Exchange {
    pub reply: String,
    pub model: String,
    pub conversation_id: ConversationId,
    pub input_tokens: i32,
    pub output_tokens: i32,
    /// Non-fatal history failures hit after the reply arrived.
    pub warnings: Vec<HistoryError>,
}

/// A conversation in progress.
pub struct ChatSession {
    provider: Arc<dyn Provider>,
    log: Arc<dyn ChatLog>,
    store: Arc<dyn ConversationStore>,
    settings: SessionSettings,
    model: String,
    conversation_id: ConversationId,
    context: Vec<Turn>,
    continuing: bool,
}

impl ChatSession {
    pub fn new(
        provider: Arc<dyn Provider>,
        log: Arc<dyn ChatLog>,
        store: Arc<dyn ConversationStore>,
        settings: SessionSettings,
        model: impl Into<String>,
        conversation_id: ConversationId,
    ) -> Self {
        Self {
            provider,
            log,
            store,
            settings,
            model: model.into(),
            conversation_id,
            context: Vec::new(),
            continuing: false,
        }
    }

    /// Seed the session with previously assembled turns.
    pub fn with_context(mut self, context: Vec<Turn>) -> Self {
        self.context = context;
        self
    }

    /// Mark the session as extending an existing thread.
    pub fn continuing(mut self, continuing: bool) -> Self {
        self.continuing = continuing;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Switch models for the following exchanges.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
        info!(model = %self.model, "Model switched");
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn context(&self) -> &[Turn] {
        &self.context
    }

    pub fn is_continuing(&self) -> bool {
        self.continuing
    }

    /// Run one exchange.
    pub async fn send(&mut self, prompt: &str) -> Result<Exchange, Error> {
        let id = self.conversation_id;

        let mut warnings = Vec::new();
        let prompt_tokens = estimate_tokens(prompt);
        let user_turn = Turn::user(prompt, id).with_tokens(prompt_tokens, 0);
        if let Err(e) = self.log.record(user_turn, self.continuing).await {
            warn!(log = %self.log.location(), error = %e, "Failed to log prompt");
            warnings.push(e);
        }

        let estimated_input = estimate_turns_tokens(&self.context)
            + prompt_tokens
            + estimate_tokens(&self.settings.system_prompt);
        let request = ProviderRequest {
            model: self.model.clone(),
            system_prompt: self.settings.system_prompt.clone(),
            context: self.context.clone(),
            prompt: prompt.to_string(),
            max_tokens: Some(max_tokens_budget(estimated_input, self.settings.max_tokens)),
            temperature: self.settings.temperature,
        };

        debug!(
            conversation_id = %id,
            model = %self.model,
            context_turns = self.context.len(),
            estimated_input,
            "Sending exchange"
        );

        let response = self.provider.complete(request).await.map_err(|e| {
            warn!(conversation_id = %id, error = %e, "Backend failed");
            e
        })?;

        let (input_tokens, output_tokens) = (response.input_tokens(), response.output_tokens());
        let assistant_turn = Turn::assistant(&response.text, &self.model, id)
            .with_tokens(input_tokens, output_tokens);
        let timestamp = assistant_turn.timestamp;

        if let Err(e) = self.log.record(assistant_turn, self.continuing).await {
            warn!(log = %self.log.location(), error = %e, "Failed to log reply");
            warnings.push(e);
        }

        let row = ConversationRow {
            prompt: prompt.to_string(),
            response: response.text.clone(),
            model_name: self.model.clone(),
            timestamp,
            temperature: self.settings.temperature,
            input_tokens,
            output_tokens,
            conversation_id: id,
        };
        if let Err(e) = self.store.insert(row).await {
            warn!(store = self.store.name(), error = %e, "Failed to store exchange");
            warnings.push(e);
        }

        self.continuing = true;
        self.context = match self.log.continue_last().await {
            Ok(turns) => turns,
            Err(e) => {
                warn!(error = %e, "Failed to reload context");
                warnings.push(e);
                Vec::new()
            }
        };

        info!(
            conversation_id = %id,
            input_tokens,
            output_tokens,
            "Exchange complete"
        );

        Ok(Exchange {
            reply: response.text,
            model: self.model.clone(),
            conversation_id: id,
            input_tokens,
            output_tokens,
            warnings,
        })
    }
}
