//! Conversation Store
//!
//! The durable, observable record of one conversation. Turns are appended in
//! call order and never edited, removed or reordered afterwards.
//!
//! # Observers
//!
//! Surfaces call [`ConversationStore::subscribe`] and receive every appended
//! turn, in append order, on an unbounded channel. Appending never waits on a
//! slow observer, and subscribers that went away are pruned on the next
//! append.

use tokio::sync::mpsc;

use crate::backend::RequestMessage;
use crate::messages::ChatTurn;

/// Append-only ordered list of chat turns
#[derive(Debug, Default)]
pub struct ConversationStore {
    turns: Vec<ChatTurn>,
    subscribers: Vec<mpsc::UnboundedSender<ChatTurn>>,
}

impl ConversationStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from previously persisted turns
    #[must_use]
    pub fn from_turns(turns: Vec<ChatTurn>) -> Self {
        Self {
            turns,
            subscribers: Vec::new(),
        }
    }

    /// Add a turn to the end and notify observers
    pub fn append(&mut self, turn: ChatTurn) {
        self.subscribers
            .retain(|subscriber| subscriber.send(turn.clone()).is_ok());
        self.turns.push(turn);

        tracing::trace!(
            turns = self.turns.len(),
            observers = self.subscribers.len(),
            "Appended turn"
        );
    }

    /// Current ordered turns, read-only
    #[must_use]
    pub fn snapshot(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Observe future appends
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ChatTurn> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// History to send to the backend
    ///
    /// Aborted turns are left out and the rest are projected to
    /// `{role, content, images}`.
    #[must_use]
    pub fn outgoing_messages(&self) -> Vec<RequestMessage> {
        self.turns
            .iter()
            .filter(|turn| !turn.aborted)
            .map(ChatTurn::to_request_message)
            .collect()
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the conversation has no turns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent turn
    #[must_use]
    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }
}
