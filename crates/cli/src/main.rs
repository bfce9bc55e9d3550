//! ask-ollama: chat with a local model server, keeping every exchange.
//!
//! Modes:
//! - `ask-ollama "prompt"`: one exchange, then exit
//! - `ask-ollama`: interactive session
//! - `ask-ollama --search <kw>`: list conversations whose replies mention `kw`
//! - `ask-ollama --show <id>`: print one stored conversation
//! - `ask-ollama --dump-config`: print the effective configuration

use askollama_config::AppConfig;
use clap::Parser;
use std::path::PathBuf;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "ask-ollama",
    about = "Chat with a local Ollama server and keep the history",
    author
)]
pub struct Cli {
    /// Prompt to send; omit for interactive mode
    pub prompt: Option<String>,

    /// Model to use (overrides the model pinned by a loaded conversation)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Send the last N turns of the chat log as context
    #[arg(short = 'n', long = "context", allow_negative_numbers = true)]
    pub context: Option<i64>,

    /// Continue the most recent conversation
    #[arg(short = 'c', long = "continue")]
    pub continue_chat: bool,

    /// Load a stored conversation by id and continue it
    #[arg(short, long)]
    pub id: Option<i64>,

    /// Search stored replies for a keyword and list matching conversation ids
    #[arg(short, long)]
    pub search: Option<String>,

    /// Print a stored conversation
    #[arg(long, value_name = "ID")]
    pub show: Option<i64>,

    /// Chat log file
    #[arg(short = 'L', long = "log")]
    pub log: Option<PathBuf>,

    /// Conversation database file
    #[arg(short = 'd', long = "database")]
    pub database: Option<PathBuf>,

    /// System prompt
    #[arg(short = 'S', long = "system-prompt")]
    pub system_prompt: Option<String>,

    /// Model context window, in tokens
    #[arg(short = 'l', long = "context-length")]
    pub context_length: Option<u32>,

    /// Reply token allowance
    #[arg(short = 't', long = "max-tokens")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 - 2.0)
    #[arg(short = 'T', long)]
    pub temperature: Option<f32>,

    /// Config file (default: ~/.config/ask-ollama/config.toml)
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub dump_config: bool,

    /// Enable debug logging
    #[arg(long)]
    pub verbose: bool,

    /// Print version and exit
    #[arg(short = 'v', long = "version")]
    pub version: bool,

    /// Print full version information and exit
    #[arg(short = 'V', long = "full-version")]
    pub full_version: bool,
}

impl Cli {
    /// The text for `-v` / `-V`, if either was given.
    pub fn version_text(&self) -> Option<String> {
        if self.full_version {
            Some(format!(
                "Version: {}\nCommit:  {}\nDate:    {}",
                env!("CARGO_PKG_VERSION"),
                option_env!("ASK_OLLAMA_COMMIT").unwrap_or("unknown"),
                option_env!("ASK_OLLAMA_BUILD_DATE").unwrap_or("unknown"),
            ))
        } else if self.version {
            Some(format!("ask-ollama version: {}", env!("CARGO_PKG_VERSION")))
        } else {
            None
        }
    }

    /// Layer command-line flags over the loaded configuration.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(model) = &self.model {
            config.model.default = model.clone();
        }
        if let Some(prompt) = &self.system_prompt {
            config.model.system_prompt = prompt.clone();
        }
        if let Some(context_length) = self.context_length {
            config.model.context_length = context_length;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.model.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.model.temperature = temperature;
        }
        if let Some(log) = &self.log {
            config.log.file = log.clone();
        }
        if let Some(database) = &self.database {
            config.database.file = database.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if let Some(text) = cli.version_text() {
        println!("{text}");
        return Ok(());
    }

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load(cli.config.as_deref())
        .map_err(|e| format!("Failed to load config: {e}"))?;
    cli.apply_to(&mut config);
    config.expand_paths();
    config
        .validate()
        .map_err(|e| format!("Invalid options: {e}"))?;

    if cli.dump_config {
        return commands::config_cmd::dump(&config);
    }
    if let Some(keyword) = &cli.search {
        return commands::history::search(&config, keyword).await;
    }
    if let Some(id) = cli.show {
        return commands::history::show(&config, id).await;
    }

    commands::chat::run(&config, &cli).await
}
