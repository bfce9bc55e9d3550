//! `ask-ollama [prompt]`: one exchange, or an interactive session.

use crate::Cli;
use askollama_agent::{ChatSession, ContextAssembler, ContextRequest, Exchange, SessionSettings};
use askollama_config::AppConfig;
use askollama_core::history::ConversationStore;
use askollama_core::turn::{ConversationId, Turn};
use askollama_history::{InMemoryConversationStore, YamlChatLog};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::warn;

/// An interactive command typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Exit,
    Context,
    /// `/model` alone shows the current model.
    Model(Option<String>),
    Id,
    Unknown(String),
}

impl SlashCommand {
    /// Parse a line starting with `/`; anything else is a prompt.
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('/')?;
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        Some(match name {
            "help" | "?" => Self::Help,
            "exit" | "quit" => Self::Exit,
            "context" => Self::Context,
            "model" if arg.is_empty() => Self::Model(None),
            "model" => Self::Model(Some(arg.to_string())),
            "id" => Self::Id,
            other => Self::Unknown(other.to_string()),
        })
    }
}

const HELP: &str = "Special commands:
  /exit, /quit      Exit the program
  /context          Show the current context
  /model [<model>]  Show or switch the model
  /id               Show the current conversation ID
  /help, /?         Show this help";

pub async fn run(config: &AppConfig, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let log = Arc::new(
        YamlChatLog::open(&config.log.file)
            .await
            .map_err(|e| format!("Error with chat log file: {e}"))?,
    );
    let store: Arc<dyn ConversationStore> = match super::open_store(config).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("Error opening database: {e} (this session will not be stored)");
            warn!(error = %e, "Falling back to in-memory conversation store");
            Arc::new(InMemoryConversationStore::new())
        }
    };

    let assembler = ContextAssembler::new(log.clone(), store.clone(), &config.model.default);
    let request = ContextRequest {
        conversation_id: cli.id.map(ConversationId),
        continue_last: cli.continue_chat,
        last_n: cli.context,
        model_override: cli.model.clone(),
    };
    let context = assembler.assemble(&request).await;
    if let Some(e) = &context.error {
        eprintln!("Error loading {} context: {e}", context.source);
    }

    let assigned = assembler
        .assign_conversation_id(request.conversation_id, request.continue_last)
        .await;
    if let Some(e) = &assigned.error {
        eprintln!("Error reading chat log: {e}");
    }

    let provider = Arc::new(askollama_providers::build_from_config(config)?);
    let mut session = ChatSession::new(
        provider,
        log,
        store,
        SessionSettings::from_config(config),
        context.model,
        assigned.id,
    )
    .with_context(context.turns)
    .continuing(request.continue_last);

    match &cli.prompt {
        Some(prompt) => {
            println!("Assistant: ");
            let exchange = session.send(prompt).await?;
            print_exchange(&exchange);
            Ok(())
        }
        None => interactive(&mut session).await,
    }
}

async fn interactive(session: &mut ChatSession) -> Result<(), Box<dyn std::error::Error>> {
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nGoodbye!");
            std::process::exit(0);
        }
    });

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        print!("{}> ", session.model());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!("\nGoodbye!");
            return Ok(());
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = SlashCommand::parse(line) {
            match command {
                SlashCommand::Help => println!("{HELP}"),
                SlashCommand::Exit => {
                    println!("Goodbye!");
                    return Ok(());
                }
                SlashCommand::Context => println!("{}", render_context(session.context())),
                SlashCommand::Model(Some(model)) => session.set_model(model),
                SlashCommand::Model(None) => println!("Model: {}", session.model()),
                SlashCommand::Id => println!("Conversation ID: {}", session.conversation_id()),
                SlashCommand::Unknown(name) => {
                    println!("Unknown command: /{name} (try /help)")
                }
            }
            continue;
        }

        println!("Assistant: ");
        match session.send(line).await {
            Ok(exchange) => print_exchange(&exchange),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}

fn print_exchange(exchange: &Exchange) {
    println!("{}", exchange.reply);
    println!("\n-{} (convID: {})", exchange.model, exchange.conversation_id);
    for warning in &exchange.warnings {
        eprintln!("warning: {warning}");
    }
}

/// One line per turn: `[id] Role: content`.
pub fn render_context(turns: &[Turn]) -> String {
    if turns.is_empty() {
        return "Context: (empty)".into();
    }
    let mut out = format!("Context ({} turns):", turns.len());
    for turn in turns {
        out.push_str(&format!(
            "\n  [{}] {}: {}",
            turn.conversation_id, turn.role, turn.content
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(SlashCommand::parse("what is 2+2?"), None);
        assert_eq!(SlashCommand::parse(" /help"), None);
    }

    #[test]
    fn parses_known_commands() {
        assert_eq!(SlashCommand::parse("/help"), Some(SlashCommand::Help));
        assert_eq!(SlashCommand::parse("/?"), Some(SlashCommand::Help));
        assert_eq!(SlashCommand::parse("/exit"), Some(SlashCommand::Exit));
        assert_eq!(SlashCommand::parse("/quit"), Some(SlashCommand::Exit));
        assert_eq!(SlashCommand::parse("/context"), Some(SlashCommand::Context));
        assert_eq!(SlashCommand::parse("/id"), Some(SlashCommand::Id));
    }

    #[test]
    fn model_takes_optional_argument() {
        assert_eq!(
            SlashCommand::parse("/model deepseek-r1:8b"),
            Some(SlashCommand::Model(Some("deepseek-r1:8b".into())))
        );
        assert_eq!(
            SlashCommand::parse("/model   qwen2  "),
            Some(SlashCommand::Model(Some("qwen2".into())))
        );
        assert_eq!(SlashCommand::parse("/model"), Some(SlashCommand::Model(None)));
    }

    #[test]
    fn unknown_commands_are_reported() {
        assert_eq!(
            SlashCommand::parse("/frobnicate now"),
            Some(SlashCommand::Unknown("frobnicate".into()))
        );
    }

    #[test]
    fn context_rendering() {
        assert_eq!(render_context(&[]), "Context: (empty)");
        let id = ConversationId(2);
        let turns = vec![Turn::user("hi", id), Turn::assistant("hello", "m", id)];
        assert_eq!(
            render_context(&turns),
            "Context (2 turns):\n  [2] user: hi\n  [2] assistant: hello"
        );
    }
}
