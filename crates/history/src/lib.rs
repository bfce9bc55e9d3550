//! History backends for ask-ollama.
//!
//! - [`YamlChatLog`]: the canonical, human-readable chat log
//! - [`SqliteConversationStore`]: the queryable per-exchange mirror
//! - [`InMemoryConversationStore`]: ephemeral store, used in tests and as the
//!   fallback when the database cannot be opened

pub mod chat_log;
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use chat_log::YamlChatLog;
pub use in_memory::InMemoryConversationStore;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConversationStore, StoreConfig};
