//! Sidechat Core - Streaming Chat Sessions against a Local Model Server
//!
//! This crate holds the headless logic of the sidechat side panel: sending a
//! user message, streaming the model's reply chunk by chunk, cancelling it
//! mid-flight, and folding the result into a persisted conversation. It has
//! no terminal or UI dependencies; surfaces only render what it reports.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Presentation Layer                       │
//! │        (sidechat CLI, or any other rendering surface)        │
//! │                                                              │
//! │    send() / abort()  ──┐          ┌──  SessionEvent / turns  │
//! └────────────────────────┼──────────┼──────────────────────────┘
//!                          │          │
//! ┌────────────────────────┼──────────┼──────────────────────────┐
//! │                  SIDECHAT CORE    │                          │
//! │  ┌─────────────────────┴──────────┴───────────────────────┐  │
//! │  │                  SessionController                     │  │
//! │  │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  │  │
//! │  │  │ Conversation │  │    Stream    │  │ HistoryFile  │  │  │
//! │  │  │    Store     │  │ Accumulator  │  │  (optional)  │  │  │
//! │  │  └──────────────┘  └──────────────┘  └──────────────┘  │  │
//! │  └───────────────────────────┬────────────────────────────┘  │
//! │                              │ ChatRequest / ChatStream      │
//! │                      ┌───────┴───────┐                       │
//! │                      │  ChatBackend  │  (OllamaBackend)      │
//! │                      └───────────────┘                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`SessionController`]: the state machine that owns one conversation
//! - [`ConversationStore`]: append-only, observable list of [`ChatTurn`]s
//! - [`StreamAccumulator`]: partial content of the reply being generated
//! - [`ChatBackend`] / [`ChatStream`]: the model server and its cancelable reply
//! - [`SessionEvent`]: what surfaces render besides the turns themselves
//!
//! # Quick Start
//!
//! ```ignore
//! use sidechat_core::{OllamaBackend, SessionConfig, SessionController};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = OllamaBackend::from_env()?;
//!     let config = SessionConfig {
//!         model: Some("llama3.2".to_string()),
//!         ..Default::default()
//!     };
//!     let mut session = SessionController::new(backend, config);
//!     let mut events = session.subscribe_events();
//!
//!     session.send("Why is the sky blue?", None).await;
//!     while session.next_step().await {
//!         while let Ok(event) = events.try_recv() {
//!             // Render event
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: model backend abstraction and the Ollama client
//! - [`config`]: TOML/env/CLI configuration
//! - [`conversation`]: the conversation store
//! - [`history`]: conversation persistence
//! - [`messages`]: turns and session events
//! - [`preferences`]: theme and language preferences
//! - [`session`]: the session controller
//! - [`streaming`]: stream outcome and accumulator

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod conversation;
pub mod history;
pub mod messages;
pub mod preferences;
pub mod session;
pub mod streaming;

// Re-exports for convenience
pub use backend::{
    BackendConfig, BackendError, ChatBackend, ChatRequest, ChatStream, OllamaBackend,
    RequestMessage, StreamProducer, StreamStep, StreamingToken,
};
pub use conversation::ConversationStore;
pub use history::{HistoryError, HistoryFile};
pub use messages::{ChatTurn, MessageRole, NotifyLevel, SessionEvent};
pub use preferences::{Lang, Preferences, PreferencesError, PreferencesStore, Theme};
pub use session::{IgnoreReason, SendOutcome, SessionConfig, SessionController, SessionState};
pub use streaming::{StreamAccumulator, StreamOutcome, StreamStats};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, SidechatConfig, SidechatToml,
};
