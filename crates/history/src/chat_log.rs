//! YAML chat log: the canonical record of every turn.
//!
//! The whole history is one YAML document: a sequence of turns with fields
//! `role, content, model, timestamp, new_conversation, input_tokens,
//! output_tokens, conv_id`.
//!
//! Every append is a read-modify-write of the entire document: load, push,
//! re-serialize, truncate, rewrite from offset zero. Schema changes are thus
//! applied retroactively to every prior record on the next write.
//!
//! The rewrite is not atomic. A crash between truncate and write loses the
//! log. Exactly one process may own a log file at a time.

use askollama_core::error::HistoryError;
use askollama_core::history::ChatLog;
use askollama_core::turn::Turn;
use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A chat log stored as a single YAML document.
///
/// The file handle is opened once (read/write, created if missing) and every
/// operation starts from offset zero.
pub struct YamlChatLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl YamlChatLog {
    /// Open (creating if needed) the log at `path`.
    ///
    /// Missing parent directories are created.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HistoryError::io(parent.display(), e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await
            .map_err(|e| HistoryError::io(path.display(), e))?;

        debug!(path = %path.display(), "Chat log opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self, file: &mut File) -> Result<Vec<Turn>, HistoryError> {
        file.seek(SeekFrom::Start(0))
            .await
            .map_err(|e| HistoryError::io(self.path.display(), e))?;

        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .await
            .map_err(|e| HistoryError::io(self.path.display(), e))?;

        parse_document(&content).map_err(|reason| HistoryError::CorruptLog {
            path: self.path.display().to_string(),
            reason,
        })
    }

    async fn rewrite(&self, file: &mut File, data: &[u8]) -> Result<(), HistoryError> {
        let io = |e: std::io::Error| HistoryError::io(self.path.display(), e);
        file.set_len(0).await.map_err(io)?;
        file.seek(SeekFrom::Start(0)).await.map_err(io)?;
        file.write_all(data).await.map_err(io)?;
        file.flush().await.map_err(io)?;
        file.sync_data().await.map_err(io)?;
        Ok(())
    }
}

/// Deserialize a log document. Empty or null documents are an empty log.
fn parse_document(content: &[u8]) -> Result<Vec<Turn>, String> {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_yaml::from_slice::<Option<Vec<Turn>>>(content)
        .map(Option::unwrap_or_default)
        .map_err(|e| e.to_string())
}

#[async_trait]
impl ChatLog for YamlChatLog {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Vec<Turn>, HistoryError> {
        let mut file = self.file.lock().await;
        self.read_all(&mut file).await
    }

    async fn append(&self, turn: Turn) -> Result<(), HistoryError> {
        let mut file = self.file.lock().await;
        let mut turns = self.read_all(&mut file).await?;
        turns.push(turn);

        let data = serde_yaml::to_string(&turns).map_err(|e| {
            warn!(error = %e, "Failed to serialize chat log");
            HistoryError::io(self.path.display(), e)
        })?;

        self.rewrite(&mut file, data.as_bytes()).await?;
        debug!(path = %self.path.display(), turns = turns.len(), "Chat log rewritten");
        Ok(())
    }
}
