//! Shared test doubles for session and assembler tests.

use askollama_core::error::{HistoryError, ProviderError};
use askollama_core::history::{ChatLog, ConversationRow, ConversationStore};
use askollama_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use askollama_core::turn::{ConversationId, Turn};
use async_trait::async_trait;
use std::sync::Mutex;

/// A provider that replays scripted results and records every request.
///
/// Panics if more calls are made than results provided.
pub struct ScriptedProvider {
    results: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(results: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replies(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(make_text_response(t))).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let mut results = self.results.lock().unwrap();
        assert!(
            !results.is_empty(),
            "ScriptedProvider: no more results (call #{})",
            requests.len() + 1
        );
        requests.push(request);
        results.remove(0)
    }
}

/// A text reply with fixed usage (10 prompt, 5 completion).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        text: text.into(),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A chat log held in memory.
#[derive(Default)]
pub struct MemLog(pub Mutex<Vec<Turn>>);

#[async_trait]
impl ChatLog for MemLog {
    fn location(&self) -> String {
        "memory".into()
    }

    async fn load(&self) -> Result<Vec<Turn>, HistoryError> {
        Ok(self.0.lock().unwrap().clone())
    }

    async fn append(&self, turn: Turn) -> Result<(), HistoryError> {
        self.0.lock().unwrap().push(turn);
        Ok(())
    }
}

/// A log whose document cannot be parsed; every read and append fails.
pub struct CorruptLog;

#[async_trait]
impl ChatLog for CorruptLog {
    fn location(&self) -> String {
        "corrupt".into()
    }

    async fn load(&self) -> Result<Vec<Turn>, HistoryError> {
        Err(HistoryError::CorruptLog {
            path: "corrupt".into(),
            reason: "bad yaml".into(),
        })
    }

    async fn append(&self, _turn: Turn) -> Result<(), HistoryError> {
        self.load().await.map(|_| ())
    }
}

/// A store whose inserts always fail.
pub struct FailingStore;

#[async_trait]
impl ConversationStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn insert(&self, _row: ConversationRow) -> Result<(), HistoryError> {
        Err(HistoryError::Store("disk I/O error".into()))
    }

    async fn rows_for(&self, _id: ConversationId) -> Result<Vec<ConversationRow>, HistoryError> {
        Err(HistoryError::Store("disk I/O error".into()))
    }

    async fn search(&self, _keyword: &str) -> Result<Vec<ConversationId>, HistoryError> {
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<usize, HistoryError> {
        Ok(0)
    }
}
