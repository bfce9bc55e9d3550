//! Error types for the ask-ollama domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all ask-ollama operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- History errors (chat log + conversation store) ---
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    // --- Model backend errors ---
    #[error("Backend error: {0}")]
    Backend(#[from] ProviderError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures raised by the chat log and the conversation store.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// File-level I/O failed (open, read, truncate, seek, write).
    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    /// The log exists but its document could not be deserialized.
    #[error("Chat log at {path} is corrupt: {reason}")]
    CorruptLog { path: String, reason: String },

    /// A last-N request asked for zero, negative, or all-or-more turns.
    #[error("Context value is invalid (either <= 0 or too large): {requested} (log holds {available} turns)")]
    InvalidRange { requested: i64, available: usize },

    #[error("No chat history to continue")]
    EmptyHistory,

    #[error("No conversation found with id: {0}")]
    NotFound(i64),

    /// Relational store insert/query failure.
    #[error("Conversation store error: {0}")]
    Store(String),
}

impl HistoryError {
    /// Build an [`HistoryError::Io`] from a path and any displayable cause.
    pub fn io(path: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Opaque failures from the model backend.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed with status {status_code}: {message}")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}
