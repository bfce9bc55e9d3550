//! Command implementations for the ask-ollama binary.

pub mod chat;
pub mod config_cmd;
pub mod history;

use askollama_config::AppConfig;
use askollama_core::error::HistoryError;
use askollama_history::{SqliteConversationStore, StoreConfig};

/// Open the configured SQLite conversation store.
pub async fn open_store(config: &AppConfig) -> Result<SqliteConversationStore, HistoryError> {
    SqliteConversationStore::open(&StoreConfig::file(
        &config.database.file,
        &config.database.table,
    ))
    .await
}
