//! Model Backend Integration
//!
//! Abstracted access to the model server through the [`ChatBackend`] trait,
//! the cancelable [`ChatStream`] handle it returns, and the Ollama
//! implementation.
//!
//! # Usage
//!
//! ```ignore
//! use sidechat_core::backend::{ChatBackend, ChatRequest, OllamaBackend, StreamStep};
//!
//! let backend = OllamaBackend::from_env()?;
//! let mut stream = backend.chat(ChatRequest::new("llama3.2", messages)).await?;
//! while let Some(StreamStep::Chunk(text)) = stream.next().await {
//!     print!("{text}");
//! }
//! ```

mod ollama;
mod stream;
mod traits;

pub use ollama::OllamaBackend;
pub use stream::{ChatStream, StreamProducer, StreamStep, StreamingToken};
pub use traits::{BackendConfig, BackendError, ChatBackend, ChatRequest, RequestMessage};
