//! `ask-ollama --search` / `--show`: read the conversation store.

use askollama_config::AppConfig;
use askollama_core::history::{ConversationRow, ConversationStore};
use askollama_core::turn::ConversationId;

pub async fn search(config: &AppConfig, keyword: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config)
        .await
        .map_err(|e| format!("Error opening database: {e}"))?;

    let ids = store
        .search(keyword)
        .await
        .map_err(|e| format!("Error searching for conversation: {e}"))?;
    println!("{}", format_search_results(&ids));
    Ok(())
}

pub async fn show(config: &AppConfig, id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config)
        .await
        .map_err(|e| format!("Error opening database: {e}"))?;

    let rows = store
        .rows_for(ConversationId(id))
        .await
        .map_err(|e| format!("Error showing conversation: {e}"))?;
    if rows.is_empty() {
        return Err(format!("No conversation found with id: {id}").into());
    }
    for row in &rows {
        println!("{}", format_row(row));
    }
    Ok(())
}

/// `Found 2 conversations: 4, 9`
pub fn format_search_results(ids: &[ConversationId]) -> String {
    let list: Vec<String> = ids.iter().map(ToString::to_string).collect();
    format!("Found {} conversations: {}", ids.len(), list.join(", "))
}

pub fn format_row(row: &ConversationRow) -> String {
    format!(
        "Prompt: {}\nResponse: {}\nModel: {}\nTemperature: {:.2}\nInput tokens: {}\nOutput tokens: {}\nConversation ID: {}\nTimestamp: {}",
        row.prompt,
        row.response,
        row.model_name,
        row.temperature,
        row.input_tokens,
        row.output_tokens,
        row.conversation_id,
        row.timestamp.format("%Y-%m-%d %H:%M:%S"),
    )
}
