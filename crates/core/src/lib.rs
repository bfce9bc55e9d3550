//! # ask-ollama Core
//!
//! Domain types, traits, and error definitions for the ask-ollama chat client.
//! This crate has **no storage or HTTP dependencies**: it defines the turn
//! model and the seams that the history, provider, and agent crates
//! implement against.
//!
//! ## Seams
//!
//! - [`ChatLog`]: the append-only, human-readable record of every turn
//! - [`ConversationStore`]: the queryable per-exchange mirror
//! - [`Provider`]: the model backend ("chat(context) -> response")

pub mod error;
pub mod turn;
pub mod history;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, HistoryError, ProviderError, Result};
pub use turn::{ConversationId, Role, Turn};
pub use history::{ChatLog, ConversationRow, ConversationStore};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
