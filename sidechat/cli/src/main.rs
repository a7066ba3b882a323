//! Sidechat - Chat with a Local Model from the Terminal
//!
//! Terminal surface for the sidechat session core. Messages typed on stdin
//! are streamed to an Ollama server and the reply is echoed as it arrives.
//!
//! # Usage
//!
//! ```bash
//! # Chat with a model
//! sidechat chat --model llama3.2
//!
//! # Remote Ollama, throwaway conversation
//! sidechat chat --host gpu-box --port 11434 --no-history
//!
//! # Preferences
//! sidechat prefs show
//! sidechat prefs set theme dark
//!
//! # Verbose logging (goes to stderr)
//! RUST_LOG=debug sidechat chat
//! ```
//!
//! # Environment Variables
//!
//! - `OLLAMA_HOST`, `OLLAMA_PORT`: model server address
//! - `SIDECHAT_MODEL`: chat model
//! - `SIDECHAT_HISTORY`: conversation history file
//! - `SIDECHAT_CONFIG`: config file
//! - `RUST_LOG`: log filter
//!
//! # Files
//!
//! - Config: `$XDG_CONFIG_HOME/sidechat/config.toml`
//! - Preferences: `$XDG_CONFIG_HOME/sidechat/preferences.toml`
//! - History: `$XDG_DATA_HOME/sidechat/history.json`

mod chat;
mod input;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use sidechat_core::{
    config::{default_config_path, load_config_from_path, ConfigOverrides},
    ConversationStore, Lang, OllamaBackend, PreferencesStore, SessionController, Theme,
};

/// Sidechat - chat with a locally hosted language model
#[derive(Parser, Debug)]
#[command(name = "sidechat")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start an interactive chat (the default)
    Chat(ChatArgs),

    /// Show or change preferences
    Prefs {
        #[command(subcommand)]
        action: Option<PrefsAction>,

        /// Preferences file path
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug, Default)]
struct ChatArgs {
    /// Chat model to use
    #[arg(short = 'm', long)]
    model: Option<String>,

    /// Ollama host
    #[arg(long)]
    host: Option<String>,

    /// Ollama port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "SIDECHAT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Conversation history file
    #[arg(long, value_name = "FILE", conflicts_with = "no_history")]
    history: Option<PathBuf>,

    /// Do not load or save the conversation
    #[arg(long)]
    no_history: bool,
}

#[derive(Subcommand, Debug)]
enum PrefsAction {
    /// Print current preferences
    Show,

    /// Change one preference
    Set {
        /// Preference key (theme or lang)
        key: String,

        /// New value
        value: String,
    },
}

impl ChatArgs {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref host) = self.host {
            overrides = overrides.with_host(host.as_str());
        }
        if let Some(port) = self.port {
            overrides = overrides.with_port(port);
        }
        if let Some(ref model) = self.model {
            overrides = overrides.with_model(model.as_str());
        }
        if let Some(ref path) = self.history {
            overrides = overrides.with_history_path(path.clone());
        }
        if self.no_history {
            overrides = overrides.without_history();
        }
        overrides
    }
}

/// Initialize logging to stderr; stdout carries the transcript
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sidechat=warn,sidechat_core=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    match args.command {
        Some(Command::Chat(chat_args)) => run_chat(chat_args).await,
        None => run_chat(ChatArgs::default()).await,
        Some(Command::Prefs { action, file }) => run_prefs(action, file),
    }
}

async fn run_chat(args: ChatArgs) -> Result<()> {
    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load configuration")?;
    args.overrides()
        .apply(&mut config)
        .context("Invalid command-line options")?;

    info!(
        host = %config.backend.host,
        port = config.backend.port,
        model = ?config.model,
        source = %config.source(),
        "Configuration loaded"
    );

    let backend =
        OllamaBackend::new(config.backend.clone()).context("Failed to create HTTP client")?;
    let mut controller = SessionController::new(backend, config.session_config());

    if let Some(history) = config.history_file() {
        let turns = history
            .load()
            .await
            .with_context(|| format!("Failed to load history from {}", history.path().display()))?;
        controller = controller
            .with_store(ConversationStore::from_turns(turns))
            .with_history(history);
    }

    chat::run(controller).await
}

fn run_prefs(action: Option<PrefsAction>, file: Option<PathBuf>) -> Result<()> {
    let path = file
        .or_else(PreferencesStore::default_path)
        .context("No config directory available for preferences")?;
    let store = PreferencesStore::new(path);

    match action.unwrap_or(PrefsAction::Show) {
        PrefsAction::Show => {
            let prefs = store.load().context("Failed to read preferences")?;
            println!("theme = {} ({})", prefs.theme, prefs.theme.label());
            println!("lang  = {} ({})", prefs.lang, prefs.lang.label());
            println!();
            println!("themes: {}", Theme::ALL.map(|t| t.as_str()).join(", "));
            println!("langs:  {}", Lang::ALL.map(|l| l.as_str()).join(", "));
        }
        PrefsAction::Set { key, value } => {
            store.set(&key, &value)?;
            println!("Preferences updated");
        }
    }
    Ok(())
}
