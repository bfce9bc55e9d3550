//! Configuration loading, validation, and management for ask-ollama.
//!
//! Loads configuration from `~/.config/ask-ollama/config.toml` (or an
//! explicit `--config` path) with environment variable overrides. Command-line
//! flags are layered on top by the binary. The resulting [`AppConfig`] is
//! passed explicitly into the stores and the backend; nothing reads ambient
//! global state after startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the application directory under the user's config home.
pub const APP_DIR: &str = "ask-ollama";

/// The root configuration structure.
///
/// Maps directly to `config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key sent as a bearer token (a local Ollama server ignores it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model and generation settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Backend endpoint settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Chat log settings
    #[serde(default)]
    pub log: LogConfig,

    /// Conversation database settings
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("backend", &self.backend)
            .field("log", &self.log)
            .field("database", &self.database)
            .finish()
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model used when neither the command line nor a loaded conversation picks one
    #[serde(default = "default_model")]
    pub default: String,

    /// Maximum context length the model accepts
    #[serde(default = "default_context_length")]
    pub context_length: u32,

    /// Maximum tokens to generate per reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub system_prompt: String,
}

fn default_model() -> String {
    "llama3.2".into()
}
fn default_context_length() -> u32 {
    2048
}
fn default_max_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default: default_model(),
            context_length: default_context_length(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// HTTP timeout for one completion request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_timeout_secs() -> u64 {
    300
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// YAML chat log path. `~` and `$VARS` are expanded.
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

fn default_log_file() -> PathBuf {
    AppConfig::config_dir().join("ask-ollama.chat.yml")
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path. `~` and `$VARS` are expanded.
    #[serde(default = "default_db_file")]
    pub file: PathBuf,

    /// Table holding one row per exchange
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_db_file() -> PathBuf {
    AppConfig::config_dir().join("ask-ollama.db")
}
fn default_table() -> String {
    "conversations".into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            file: default_db_file(),
            table: default_table(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, or from the default location when `None`.
    ///
    /// Environment variables override the file:
    /// - `ASK_OLLAMA_API_KEY`
    /// - `ASK_OLLAMA_MODEL`
    /// - `ASK_OLLAMA_API_URL`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => expand_path(p),
            None => Self::config_dir().join("config.toml"),
        };
        if path.is_some() && !config_path.exists() {
            return Err(ConfigError::ReadError {
                path: config_path,
                reason: "file does not exist".into(),
            });
        }

        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("ASK_OLLAMA_API_KEY").ok();
        }
        if let Ok(model) = std::env::var("ASK_OLLAMA_MODEL") {
            config.model.default = model;
        }
        if let Ok(url) = std::env::var("ASK_OLLAMA_API_URL") {
            config.backend.api_url = url;
        }

        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/ask-ollama`, falling back to `~/.config/ask-ollama`.
    pub fn config_dir() -> PathBuf {
        match std::env::var_os("XDG_CONFIG_HOME") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir).join(APP_DIR),
            _ => dirs_home().join(".config").join(APP_DIR),
        }
    }

    /// Expand `~` and environment variables in the log and database paths.
    pub fn expand_paths(&mut self) {
        self.log.file = expand_path(&self.log.file);
        self.database.file = expand_path(&self.database.file);
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.model.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "model.max_tokens must be > 0".into(),
            ));
        }
        if !is_sql_identifier(&self.database.table) {
            return Err(ConfigError::ValidationError(format!(
                "database.table '{}' is not a valid table name",
                self.database.table
            )));
        }
        if self.model.default.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "model.default must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Render the effective configuration as TOML (for `--dump-config`).
    ///
    /// The API key is never included.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let redacted = Self {
            api_key: None,
            ..self.clone()
        };
        toml::to_string_pretty(&redacted).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: ModelConfig::default(),
            backend: BackendConfig::default(),
            log: LogConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`; the table name is spliced into SQL text.
pub fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Expand a leading `~` and any `$VAR` / `${VAR}` references.
///
/// Unknown variables expand to the empty string.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let home_expanded = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            format!("{}{}", dirs_home().display(), rest)
        }
        _ => raw.into_owned(),
    };
    PathBuf::from(expand_env(&home_expanded))
}

fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let name: String = if chars.peek() == Some(&'{') {
            chars.next();
            chars.by_ref().take_while(|&c| c != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            name
        };
        if name.is_empty() {
            out.push('$');
        } else {
            out.push_str(&std::env::var(&name).unwrap_or_default());
        }
    }
    out
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.max_tokens, 512);
        assert_eq!(config.model.context_length, 2048);
        assert_eq!(config.database.table, "conversations");
        assert!(config.log.file.ends_with("ask-ollama.chat.yml"));
        assert!(config.database.file.ends_with("ask-ollama.db"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.default, config.model.default);
        assert_eq!(parsed.backend.api_url, config.backend.api_url);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.model.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_table_name_rejected() {
        let mut config = AppConfig::default();
        config.database.table = "conversations; DROP TABLE x".into();
        assert!(config.validate().is_err());
        config.database.table = "1abc".into();
        assert!(config.validate().is_err());
        config.database.table = "chat_history_2".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.model.default, "llama3.2");
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/ask-ollama.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            r#"
[model]
default = "deepseek-r1:14b"
temperature = 0.2

[database]
table = "chats"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(tmp.path()).unwrap();
        assert_eq!(config.model.default, "deepseek-r1:14b");
        assert!((config.model.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.model.max_tokens, 512);
        assert_eq!(config.database.table, "chats");
        assert_eq!(config.backend.api_url, "http://localhost:11434/v1");
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "model = [this is not toml").unwrap();
        let result = AppConfig::load_from(tmp.path());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs_home();
        let expanded = expand_path(Path::new("~/chats/log.yml"));
        assert_eq!(expanded, home.join("chats/log.yml"));
        // Only a leading "~/" is special
        assert_eq!(
            expand_path(Path::new("/srv/~user/log.yml")),
            PathBuf::from("/srv/~user/log.yml")
        );
    }

    #[test]
    fn env_vars_expand_in_paths() {
        let home = std::env::var("HOME").unwrap_or_default();
        assert_eq!(
            expand_path(Path::new("$HOME/a.db")),
            PathBuf::from(format!("{home}/a.db"))
        );
        assert_eq!(
            expand_path(Path::new("${HOME}/b.db")),
            PathBuf::from(format!("{home}/b.db"))
        );
        assert_eq!(expand_path(Path::new("cost$")), PathBuf::from("cost$"));
    }

    #[test]
    fn dump_never_contains_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let dumped = config.to_toml().unwrap();
        assert!(!dumped.contains("sk-secret"));
        assert!(dumped.contains("[model]"));
        assert!(format!("{config:?}").contains("[REDACTED]"));
    }
}
