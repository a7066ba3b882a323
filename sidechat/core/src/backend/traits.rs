//! Chat Backend Traits
//!
//! Trait definitions for the model backend. The session controller only ever
//! talks to a [`ChatBackend`]; the Ollama client is one implementation and the
//! tests script their own.
//!
//! # Design Philosophy
//!
//! The backend opens a stream and hands back a [`ChatStream`]. It does not
//! know about turns, history files or surfaces. Provider details (wire
//! format, connection handling) stay behind the trait.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use super::stream::ChatStream;
use crate::messages::MessageRole;

/// Errors raised while opening or consuming a chat stream
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport failure talking to the backend
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (may be empty)
        body: String,
    },

    /// A response line could not be decoded
    #[error("malformed response: {0}")]
    Decode(String),

    /// Backend rejected the request with an error message
    #[error("{0}")]
    Server(String),

    /// The stream was cancelled by the caller
    #[error("generation cancelled")]
    Cancelled,
}

impl BackendError {
    /// Whether this is the expected user-initiated cancellation
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// One message of the outgoing history
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RequestMessage {
    /// Author of the message
    pub role: MessageRole,
    /// Message text
    pub content: String,
    /// Attached images
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

/// A streaming chat request
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    /// Model to use (backend-specific identifier)
    pub model: String,
    /// Conversation so far, oldest first, ending with the new user turn
    pub messages: Vec<RequestMessage>,
    /// Always `true`; the controller only consumes streamed replies
    pub stream: bool,
}

impl ChatRequest {
    /// Create a streaming request
    pub fn new(model: impl Into<String>, messages: Vec<RequestMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }
}

/// Chat backend trait
///
/// Implement this trait to plug a different model server into the controller.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Backend name (e.g., "Ollama")
    fn name(&self) -> &str;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Open a streaming chat completion
    ///
    /// Returns once the backend has accepted the request. Chunks are then
    /// read from the returned handle.
    async fn chat(&self, request: ChatRequest) -> Result<ChatStream, BackendError>;
}

/// Backend connection configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    /// Ollama host address
    pub host: String,
    /// Ollama port number
    pub port: u16,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11434,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl BackendConfig {
    /// Create configuration for a host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Create configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let host = std::env::var("OLLAMA_HOST").unwrap_or(defaults.host);
        let port = std::env::var("OLLAMA_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        Self {
            host,
            port,
            connect_timeout: defaults.connect_timeout,
        }
    }

    /// Base URL of the server
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}
