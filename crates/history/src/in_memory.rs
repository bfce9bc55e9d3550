//! In-memory conversation store, useful for testing and for keeping a
//! session alive when the database cannot be opened.

use askollama_core::error::HistoryError;
use askollama_core::history::{ConversationRow, ConversationStore};
use askollama_core::turn::ConversationId;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A conversation store that keeps rows in a Vec, in insertion order.
///
/// Search matches like SQLite's default `LIKE`: substring, ASCII
/// case-insensitive.
pub struct InMemoryConversationStore {
    rows: Arc<RwLock<Vec<ConversationRow>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn insert(&self, row: ConversationRow) -> Result<(), HistoryError> {
        self.rows.write().await.push(row);
        Ok(())
    }

    async fn rows_for(&self, id: ConversationId) -> Result<Vec<ConversationRow>, HistoryError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|r| r.conversation_id == id)
            .cloned()
            .collect())
    }

    async fn search(&self, keyword: &str) -> Result<Vec<ConversationId>, HistoryError> {
        let needle = keyword.to_ascii_lowercase();
        let rows = self.rows.read().await;
        let mut ids: Vec<ConversationId> = Vec::new();
        for row in rows.iter() {
            if row.response.to_ascii_lowercase().contains(&needle)
                && !ids.contains(&row.conversation_id)
            {
                ids.push(row.conversation_id);
            }
        }
        Ok(ids)
    }

    async fn count(&self) -> Result<usize, HistoryError> {
        Ok(self.rows.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askollama_core::turn::Role;
    use chrono::Utc;

    fn row(prompt: &str, response: &str, model: &str, id: i64) -> ConversationRow {
        ConversationRow {
            prompt: prompt.into(),
            response: response.into(),
            model_name: model.into(),
            timestamp: Utc::now(),
            temperature: 0.7,
            input_tokens: 10,
            output_tokens: 20,
            conversation_id: ConversationId(id),
        }
    }

    #[tokio::test]
    async fn load_by_id_alternates_roles() {
        let store = InMemoryConversationStore::new();
        store.insert(row("p1", "r1", "m", 1)).await.unwrap();
        store.insert(row("other", "other", "m", 2)).await.unwrap();
        store.insert(row("p2", "r2", "m", 1)).await.unwrap();

        let turns = store.load_by_id(ConversationId(1)).await.unwrap();
        assert_eq!(turns.len(), 4);
        let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(turns[2].content, "p2");
    }

    #[tokio::test]
    async fn search_collapses_duplicate_ids() {
        let store = InMemoryConversationStore::new();
        store.insert(row("a", "Rust is fun", "m", 4)).await.unwrap();
        store.insert(row("b", "rust again", "m", 4)).await.unwrap();
        store.insert(row("c", "RUST", "m", 2)).await.unwrap();
        store.insert(row("d", "python", "m", 3)).await.unwrap();

        let ids = store.search("rust").await.unwrap();
        assert_eq!(ids, [ConversationId(4), ConversationId(2)]);
        assert!(store.search("marklar").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn model_of_takes_last_row() {
        let store = InMemoryConversationStore::new();
        assert!(store.model_of(ConversationId(1)).await.unwrap().is_none());
        store.insert(row("a", "b", "llama3", 1)).await.unwrap();
        store.insert(row("c", "d", "qwen2", 1)).await.unwrap();
        assert_eq!(
            store.model_of(ConversationId(1)).await.unwrap().as_deref(),
            Some("qwen2")
        );
        assert_eq!(store.count().await.unwrap(), 2);
    }
}
