//! Chat Turns and Session Events
//!
//! The conversation data model plus the events the session controller emits
//! toward whatever surface is rendering it.
//!
//! # Design Philosophy
//!
//! Surfaces are renderers. They never interpret raw backend errors or poke at
//! controller internals. Everything they need arrives as a [`ChatTurn`] appended
//! to the conversation store or as a [`SessionEvent`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::RequestMessage;
use crate::session::SessionState;

/// Who authored a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// Model output
    Assistant,
}

impl MessageRole {
    /// Wire name used by the backend
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finalized message in a conversation
///
/// Turns are immutable once appended to the store. The in-flight assistant
/// reply lives in the stream accumulator until it is folded into a turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who sent this turn
    pub role: MessageRole,
    /// Message text
    pub content: String,
    /// When the turn was created
    pub timestamp: DateTime<Utc>,
    /// Model that produced (assistant) or was addressed by (user) this turn
    pub model: String,
    /// Image references attached to the request (base64 payloads for Ollama)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    /// Generation was cancelled by the user before it completed
    #[serde(default, skip_serializing_if = "is_false")]
    pub aborted: bool,
}

impl ChatTurn {
    /// Create a user turn stamped with the current time
    pub fn user(
        content: impl Into<String>,
        model: impl Into<String>,
        images: Option<Vec<String>>,
    ) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            model: model.into(),
            images,
            aborted: false,
        }
    }

    /// Create an assistant turn stamped with the current time
    ///
    /// `images` echoes the request's image context for record keeping only.
    pub fn assistant(
        content: impl Into<String>,
        model: impl Into<String>,
        images: Option<Vec<String>>,
        aborted: bool,
    ) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            model: model.into(),
            images,
            aborted,
        }
    }

    /// Project this turn to the shape the backend consumes
    ///
    /// Timestamps and model metadata are dropped.
    #[must_use]
    pub fn to_request_message(&self) -> RequestMessage {
        RequestMessage {
            role: self.role,
            content: self.content.clone(),
            images: self.images.clone(),
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

/// Events from the session controller to a rendering surface
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Controller state changed
    State {
        /// The new state
        state: SessionState,
    },

    /// A chunk was appended to the in-flight reply
    ///
    /// Surfaces should re-render the pending assistant message.
    Token {
        /// The chunk text
        text: String,
    },

    /// Follow the newest content
    ScrollToLatest,

    /// User-facing notification
    Notify {
        /// Notification level
        level: NotifyLevel,
        /// Message content
        message: String,
    },
}

/// Notification levels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Something did not work but the conversation goes on
    Warning,
    /// The generation failed
    Error,
}
