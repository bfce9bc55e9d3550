//! SQLite conversation store.
//!
//! One table (name configurable, default `conversations`) with one row per
//! completed exchange:
//!
//! | column | type |
//! |--------|------|
//! | `prompt`, `response`, `model_name` | TEXT |
//! | `timestamp` | TEXT (RFC 3339) |
//! | `temperature` | REAL |
//! | `input_tokens`, `output_tokens`, `conv_id` | INTEGER |
//!
//! Rows are read back in `rowid` order, which is insertion order.

use askollama_core::error::HistoryError;
use askollama_core::history::{ConversationRow, ConversationStore};
use askollama_core::turn::ConversationId;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

/// Where the store lives and which table it owns.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database file, or `None` for an in-process ephemeral database.
    pub path: Option<PathBuf>,
    pub table: String,
}

impl StoreConfig {
    pub fn file(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            table: table.into(),
        }
    }

    pub fn in_memory(table: impl Into<String>) -> Self {
        Self {
            path: None,
            table: table.into(),
        }
    }
}

/// A production SQLite conversation store.
pub struct SqliteConversationStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteConversationStore {
    /// Open the store, creating the database file and table if needed.
    pub async fn open(config: &StoreConfig) -> Result<Self, HistoryError> {
        if !is_valid_table_name(&config.table) {
            return Err(HistoryError::Store(format!(
                "Invalid table name: {:?}",
                config.table
            )));
        }

        let (options, pool_options) = match &config.path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| HistoryError::io(parent.display(), e))?;
                }
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal);
                (options, SqlitePoolOptions::new().max_connections(4))
            }
            None => {
                // Every connection to ":memory:" is its own database, so pin one.
                let options = SqliteConnectOptions::from_str("sqlite::memory:")
                    .map_err(|e| HistoryError::Store(format!("Invalid SQLite path: {e}")))?;
                let pool_options = SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None);
                (options, pool_options)
            }
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| HistoryError::Store(format!("Failed to open SQLite: {e}")))?;

        let store = Self {
            pool,
            table: config.table.clone(),
        };
        store.run_migrations().await?;
        info!(
            table = %store.table,
            path = %config.path.as_ref().map_or("(memory)".into(), |p| p.display().to_string()),
            "Conversation store initialized"
        );
        Ok(store)
    }

    /// Create the table and its lookup index.
    async fn run_migrations(&self) -> Result<(), HistoryError> {
        let table = &self.table;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                prompt        TEXT NOT NULL,
                response      TEXT NOT NULL,
                model_name    TEXT NOT NULL,
                timestamp     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                temperature   REAL,
                input_tokens  INTEGER,
                output_tokens INTEGER,
                conv_id       INTEGER
            )
            "#
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Store(format!("{table} table: {e}")))?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_conv_id ON {table}(conv_id)"
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Store(format!("conv_id index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Parse a `ConversationRow` from a SQLite row.
    fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationRow, HistoryError> {
        let column = |name: &str, e: sqlx::Error| HistoryError::Store(format!("{name} column: {e}"));

        let prompt: String = row.try_get("prompt").map_err(|e| column("prompt", e))?;
        let response: String = row.try_get("response").map_err(|e| column("response", e))?;
        let model_name: String = row
            .try_get("model_name")
            .map_err(|e| column("model_name", e))?;
        let timestamp: Option<String> = row
            .try_get("timestamp")
            .map_err(|e| column("timestamp", e))?;
        let temperature: Option<f64> = row
            .try_get("temperature")
            .map_err(|e| column("temperature", e))?;
        let input_tokens: Option<i64> = row
            .try_get("input_tokens")
            .map_err(|e| column("input_tokens", e))?;
        let output_tokens: Option<i64> = row
            .try_get("output_tokens")
            .map_err(|e| column("output_tokens", e))?;
        let conv_id: Option<i64> = row.try_get("conv_id").map_err(|e| column("conv_id", e))?;

        Ok(ConversationRow {
            prompt,
            response,
            model_name,
            timestamp: timestamp.as_deref().map_or_else(Utc::now, parse_timestamp),
            temperature: temperature.unwrap_or_default() as f32,
            input_tokens: input_tokens.unwrap_or_default() as i32,
            output_tokens: output_tokens.unwrap_or_default() as i32,
            conversation_id: ConversationId(conv_id.unwrap_or_default()),
        })
    }
}

/// RFC 3339 as written by this store, or SQLite's `CURRENT_TIMESTAMP` form
/// (`YYYY-MM-DD HH:MM:SS`, UTC) for rows written by other tools.
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|n| n.and_utc()))
        .unwrap_or_else(|_| Utc::now())
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'` pattern.
fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert(&self, row: ConversationRow) -> Result<(), HistoryError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (prompt, response, model_name, timestamp, temperature, input_tokens, output_tokens, conv_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            self.table
        ))
        .bind(&row.prompt)
        .bind(&row.response)
        .bind(&row.model_name)
        .bind(row.timestamp.to_rfc3339())
        .bind(row.temperature as f64)
        .bind(row.input_tokens as i64)
        .bind(row.output_tokens as i64)
        .bind(row.conversation_id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Store(format!("INSERT failed: {e}")))?;

        debug!(conv_id = %row.conversation_id, "Stored exchange");
        Ok(())
    }

    async fn rows_for(&self, id: ConversationId) -> Result<Vec<ConversationRow>, HistoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT prompt, response, model_name, timestamp, temperature, input_tokens, output_tokens, conv_id
            FROM {} WHERE conv_id = ?1
            ORDER BY rowid
            "#,
            self.table
        ))
        .bind(id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HistoryError::Store(format!("SELECT failed: {e}")))?;

        rows.iter().map(Self::row_to_conversation).collect()
    }

    async fn search(&self, keyword: &str) -> Result<Vec<ConversationId>, HistoryError> {
        let rows = sqlx::query(&format!(
            r"SELECT conv_id FROM {} WHERE response LIKE ?1 ESCAPE '\' ORDER BY rowid",
            self.table
        ))
        .bind(like_pattern(keyword))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HistoryError::Store(format!("Search failed: {e}")))?;

        let mut ids: Vec<ConversationId> = Vec::new();
        for row in &rows {
            // Rows without a conv_id cannot be loaded back; skip them
            let conv_id: Option<i64> = row
                .try_get("conv_id")
                .map_err(|e| HistoryError::Store(format!("conv_id column: {e}")))?;
            if let Some(id) = conv_id.map(ConversationId) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    async fn count(&self) -> Result<usize, HistoryError> {
        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
                .fetch_one(&self.pool)
                .await
                .map_err(|e| HistoryError::Store(format!("Count failed: {e}")))?;
        Ok(count as usize)
    }
}
