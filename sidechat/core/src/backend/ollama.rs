//! Ollama Backend Implementation
//!
//! Chat backend for Ollama (local LLM server).
//!
//! # Ollama API
//!
//! - `/api/chat` - Chat completions with message history (streamed as NDJSON)
//! - `/api/tags` - List available models (used as the health check)
//!
//! Each streamed line looks like
//! `{"message":{"role":"assistant","content":"Hel"},"done":false}`; the last
//! one carries `"done":true`. Failures arrive as `{"error":"..."}`.

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;

use super::stream::{ChatStream, StreamProducer};
use super::traits::{BackendConfig, BackendError, ChatBackend, ChatRequest};

/// Tokens buffered between the reader task and the controller
const STREAM_CHANNEL_CAPACITY: usize = 100;

/// Ollama backend client
#[derive(Clone, Debug)]
pub struct OllamaBackend {
    config: BackendConfig,
    http_client: reqwest::Client,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    ///
    /// Only the connect phase is bounded; a streamed reply may legitimately
    /// run for minutes.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Create from environment variables (`OLLAMA_HOST`, `OLLAMA_PORT`)
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn from_env() -> Result<Self, BackendError> {
        Self::new(BackendConfig::from_env())
    }

    /// Connection settings in use
    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url())
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.config.base_url())
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    async fn health_check(&self) -> bool {
        self.http_client
            .get(self.tags_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok_and(|response| response.status().is_success())
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatStream, BackendError> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Opening Ollama chat stream"
        );

        let response = self
            .http_client
            .post(self.chat_url())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let (producer, stream) = ChatStream::channel(STREAM_CHANNEL_CAPACITY);
        let body = response.bytes_stream();
        tokio::spawn(forward_body(body, producer));

        Ok(stream)
    }
}

/// Read an NDJSON body and forward its tokens until done, failure or cancel
async fn forward_body<S, B, E>(body: S, producer: StreamProducer)
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut body = std::pin::pin!(body);
    let mut lines = LineBuffer::default();

    loop {
        let chunk = tokio::select! {
            biased;
            () = producer.cancelled() => {
                tracing::debug!("Chat stream cancelled, closing response body");
                return;
            }
            chunk = body.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                for line in lines.push(bytes.as_ref()) {
                    match forward_line(&line, &producer).await {
                        LineAction::Continue => {}
                        LineAction::Stop => return,
                        LineAction::Complete => {
                            producer.complete().await;
                            return;
                        }
                        LineAction::Fail(error) => {
                            producer.fail(error).await;
                            return;
                        }
                    }
                }
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Chat stream transport error");
                producer.fail(e.to_string()).await;
                return;
            }
            None => break,
        }
    }

    // Body ended; a final line may lack its newline
    if let Some(line) = lines.finish() {
        match forward_line(&line, &producer).await {
            LineAction::Stop => return,
            LineAction::Fail(error) => {
                producer.fail(error).await;
                return;
            }
            LineAction::Continue | LineAction::Complete => {}
        }
    }

    tracing::debug!("Chat stream ended without done marker");
    producer.complete().await;
}

enum LineAction {
    Continue,
    Stop,
    Complete,
    Fail(String),
}

async fn forward_line(line: &str, producer: &StreamProducer) -> LineAction {
    let parsed = match parse_line(line) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => return LineAction::Continue,
        Err(e) => return LineAction::Fail(e.to_string()),
    };

    if let Some(error) = parsed.error {
        return LineAction::Fail(error);
    }

    if let Some(token) = parsed.token {
        if !token.is_empty() && !producer.token(token).await {
            // Receiver dropped, stop streaming
            return LineAction::Stop;
        }
    }

    if parsed.done {
        LineAction::Complete
    } else {
        LineAction::Continue
    }
}

/// Ollama reports request errors as `{"error":"..."}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

fn status_error(status: u16, body: String) -> BackendError {
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => BackendError::Server(parsed.error),
        Err(_) => BackendError::Status { status, body },
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponseLine {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, PartialEq, Eq)]
struct ParsedLine {
    token: Option<String>,
    done: bool,
    error: Option<String>,
}

/// Decode one NDJSON line; blank lines yield `None`
fn parse_line(line: &str) -> Result<Option<ParsedLine>, BackendError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let data: ChatResponseLine =
        serde_json::from_str(line).map_err(|e| BackendError::Decode(e.to_string()))?;

    Ok(Some(ParsedLine {
        token: data.message.map(|m| m.content),
        done: data.done,
        error: data.error,
    }))
}

/// Splits a byte stream into lines without breaking multi-byte characters
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        lines
    }

    fn finish(self) -> Option<String> {
        if self.pending.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(String::from_utf8_lossy(&self.pending).into_owned())
        }
    }
}
