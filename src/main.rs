use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use parley::config::AppConfig;
use parley::models::ConversationId;
use parley::providers::openai::OpenAiFactory;
use parley::providers::SinkError;
use parley::services::{
    stream_to_sink, ChatError, ChatService, ChatStreamRequest, ConfigStore, Database,
    DeliverySink, SettingsRequest, SettingsService,
};

#[derive(Debug, Parser)]
#[command(name = "parley", version, about = "Chat with an OpenAI-compatible model")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the database location
    #[arg(long)]
    database: Option<PathBuf>,

    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

const HELP: &str = "\
Type a message to chat. Ctrl-C stops a reply in progress.

  /new                                   start a new conversation
  /list                                  list conversations
  /open <id>                             continue a conversation
  /history [id]                          show messages
  /delete <id>                           delete a conversation
  /settings                              show provider settings
  /set <provider> <model> <url|-> <key>  replace provider settings
  /providers                             list provider presets
  /quit                                  exit";

/// Prints streamed output straight to the terminal.
struct TerminalSink {
    stdout: tokio::io::Stdout,
    conversation_id: Option<ConversationId>,
}

impl TerminalSink {
    fn new() -> Self {
        Self {
            stdout: tokio::io::stdout(),
            conversation_id: None,
        }
    }

    async fn write(&mut self, text: &str) -> Result<(), SinkError> {
        self.stdout
            .write_all(text.as_bytes())
            .await
            .map_err(|e| SinkError::Failed(e.to_string()))?;
        self.stdout
            .flush()
            .await
            .map_err(|e| SinkError::Failed(e.to_string()))
    }
}

#[async_trait]
impl DeliverySink for TerminalSink {
    async fn on_start(&mut self, conversation_id: ConversationId) -> Result<(), SinkError> {
        self.conversation_id = Some(conversation_id);
        Ok(())
    }

    async fn on_content(&mut self, chunk: &str) -> Result<(), SinkError> {
        self.write(chunk).await
    }

    async fn on_error(&mut self, message: &str) -> Result<(), SinkError> {
        self.write(&format!("\n[error] {}\n", message)).await
    }

    async fn on_done(&mut self, _conversation_id: ConversationId) -> Result<(), SinkError> {
        self.write("\n").await
    }
}

struct Session {
    chat: ChatService,
    settings: SettingsService,
    current: Option<ConversationId>,
}

impl Session {
    async fn send(&mut self, text: &str) {
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let mut sink = TerminalSink::new();
        let request = ChatStreamRequest {
            conversation_id: self.current,
            message: text.to_string(),
        };
        let result = stream_to_sink(&self.chat, &cancel, request, &mut sink).await;
        watcher.abort();

        // A new conversation exists as soon as the stream started, even if
        // generation later failed.
        self.current = sink.conversation_id.or(self.current);

        match result {
            Ok(_) => {}
            Err(ChatError::Cancelled) => println!("\n[cancelled]"),
            Err(ChatError::Validation(e)) => eprintln!("error: {}", e),
            // Already reported through the sink.
            Err(_) => {}
        }
    }

    /// Returns `false` when the session should end.
    async fn command(&mut self, line: &str) -> Result<bool> {
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match name {
            "quit" | "exit" => return Ok(false),
            "help" => println!("{}", HELP),
            "new" => {
                self.current = None;
                println!("Started a new conversation.");
            }
            "list" => {
                for conv in self.chat.list_conversations().await? {
                    let marker = if Some(conv.id) == self.current { "*" } else { " " };
                    println!(
                        "{}{:>5}  {}  {}",
                        marker,
                        conv.id,
                        conv.updated_at.format("%Y-%m-%d %H:%M"),
                        conv.title
                    );
                }
            }
            "open" => {
                let id = parse_id(args.first().copied())?;
                let conv = self
                    .chat
                    .get_conversation(id)
                    .await?
                    .ok_or_else(|| anyhow!("conversation {} not found", id))?;
                self.current = Some(conv.id);
                println!("Continuing \"{}\".", conv.title);
            }
            "history" => {
                let id = match args.first().copied() {
                    Some(arg) => parse_id(Some(arg))?,
                    None => self.current.context("no conversation selected")?,
                };
                for msg in self.chat.history(id).await? {
                    println!("[{}] {}\n", msg.role.as_str(), msg.content);
                }
            }
            "delete" => {
                let id = parse_id(args.first().copied())?;
                if self.chat.delete_conversation(id).await? {
                    if self.current == Some(id) {
                        self.current = None;
                    }
                    println!("Deleted conversation {}.", id);
                } else {
                    println!("No conversation {}.", id);
                }
            }
            "settings" => {
                let view = self.settings.get();
                println!("provider: {}", view.provider);
                println!("model:    {}", view.model);
                println!("base_url: {}", view.base_url);
                println!("api_key:  {}", view.api_key);
            }
            "set" => {
                let &[provider, model, base_url, api_key] = args.as_slice() else {
                    bail!("usage: /set <provider> <model> <base_url|-> <api_key>");
                };
                let base_url = if base_url == "-" { "" } else { base_url };
                self.settings
                    .update(SettingsRequest {
                        provider: provider.to_string(),
                        model: model.to_string(),
                        base_url: base_url.to_string(),
                        api_key: api_key.to_string(),
                    })
                    .await?;
                println!("Settings updated.");
            }
            "providers" => {
                for preset in self.settings.presets() {
                    let url = if preset.base_url.is_empty() {
                        "(custom)"
                    } else {
                        preset.base_url
                    };
                    println!("{:<16} {}", preset.name, url);
                    if !preset.models.is_empty() {
                        println!("{:<16} {}", "", preset.models.join(", "));
                    }
                }
            }
            other => bail!("unknown command /{} (try /help)", other),
        }

        Ok(true)
    }
}

fn parse_id(arg: Option<&str>) -> Result<ConversationId> {
    let arg = arg.context("missing conversation id")?;
    arg.parse()
        .with_context(|| format!("invalid conversation id {:?}", arg))
}

async fn run(mut session: Session) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("parley: type /help for commands");

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            match session.command(command).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => eprintln!("error: {:#}", e),
            }
        } else {
            session.send(line).await;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load(cli.config.as_deref())
        .map_err(|e| anyhow!("Failed to load configuration: {}", e))?;
    if let Some(path) = cli.database {
        config.database_path = path;
    }

    let db = Database::open(&config.database_path).await?;
    tracing::info!(path = %config.database_path.display(), "database ready");

    let store = Arc::new(
        ConfigStore::new(Arc::new(OpenAiFactory), config.ai)
            .await
            .context("Failed to initialize provider (is AI_API_KEY set?)")?,
    );
    tracing::info!(settings = ?store.settings(), "provider ready");

    let session = Session {
        chat: ChatService::new(db, store.clone()),
        settings: SettingsService::new(store),
        current: None,
    };

    run(session).await
}
