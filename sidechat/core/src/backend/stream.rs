//! Cancelable Chat Stream Handle
//!
//! A [`ChatStream`] is the consumer half of one streamed reply. Producers
//! (the Ollama reader task, test doubles) push [`StreamingToken`]s through a
//! [`StreamProducer`]; the session controller reads [`StreamStep`]s.
//!
//! Cancellation is cooperative. [`ChatStream::cancel`] trips a shared
//! `CancellationToken`; the next read reports [`StreamOutcome::Cancelled`]
//! ahead of any chunks still queued, and producers watching the token stop
//! reading from the network. A reply whose terminal token is already queued
//! has finished; cancelling it changes nothing and it is delivered in full.

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::streaming::StreamOutcome;

/// Token stream events pushed by a producer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamingToken {
    /// A piece of the reply
    Token(String),
    /// Reply finished normally
    Complete,
    /// Reply failed
    Error(String),
}

impl StreamingToken {
    /// Whether this token ends the stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error(_))
    }
}

/// What the consumer observes on each read
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamStep {
    /// A chunk of reply text, in delivery order
    Chunk(String),
    /// The stream is over; no further steps follow
    End(StreamOutcome),
}

/// Consumer half of a streamed reply
///
/// Finite and not restartable: after a [`StreamStep::End`] every read
/// returns `None`. Dropping the handle cancels the producer.
#[derive(Debug)]
pub struct ChatStream {
    receiver: mpsc::Receiver<StreamingToken>,
    cancel: CancellationToken,
    /// Tokens of a finished reply, drained after cancellation
    backlog: VecDeque<StreamingToken>,
    finished: bool,
}

/// Producer half of a streamed reply
#[derive(Debug)]
pub struct StreamProducer {
    tx: mpsc::Sender<StreamingToken>,
    cancel: CancellationToken,
}

impl ChatStream {
    /// Create a connected producer/consumer pair
    #[must_use]
    pub fn channel(capacity: usize) -> (StreamProducer, Self) {
        let (tx, receiver) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let producer = StreamProducer {
            tx,
            cancel: cancel.clone(),
        };
        let stream = Self {
            receiver,
            cancel,
            backlog: VecDeque::new(),
            finished: false,
        };
        (producer, stream)
    }

    /// Request cancellation (idempotent)
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the next step
    ///
    /// Cancel-safe: dropping the future before it resolves loses nothing.
    pub async fn next(&mut self) -> Option<StreamStep> {
        if self.finished {
            return None;
        }

        let step = tokio::select! {
            biased;
            () = self.cancel.cancelled() => self.cancelled_step(),
            token = self.receiver.recv() => Self::step_from(token),
        };
        Some(self.observe(step))
    }

    /// Take the next step if one is ready, without waiting
    pub fn try_next(&mut self) -> Option<StreamStep> {
        if self.finished {
            return None;
        }

        if self.cancel.is_cancelled() {
            let step = self.cancelled_step();
            return Some(self.observe(step));
        }

        match self.receiver.try_recv() {
            Ok(token) => Some(self.observe(Self::step_from(Some(token)))),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Some(self.observe(Self::step_from(None)))
            }
        }
    }

    /// Step to report once cancellation was requested
    ///
    /// Queued chunks are dropped unless the producer already queued its
    /// terminal token, in which case the reply is replayed as delivered.
    fn cancelled_step(&mut self) -> StreamStep {
        if self.backlog.is_empty() {
            while let Ok(token) = self.receiver.try_recv() {
                let terminal = token.is_terminal();
                self.backlog.push_back(token);
                if terminal {
                    break;
                }
            }
            if !self.backlog.iter().any(StreamingToken::is_terminal) {
                self.backlog.clear();
            }
        }

        match self.backlog.pop_front() {
            Some(token) => Self::step_from(Some(token)),
            None => StreamStep::End(StreamOutcome::Cancelled),
        }
    }

    fn observe(&mut self, step: StreamStep) -> StreamStep {
        if matches!(step, StreamStep::End(_)) {
            self.finished = true;
        }
        step
    }

    fn step_from(token: Option<StreamingToken>) -> StreamStep {
        match token {
            Some(StreamingToken::Token(text)) => StreamStep::Chunk(text),
            Some(StreamingToken::Complete) => StreamStep::End(StreamOutcome::Completed),
            Some(StreamingToken::Error(error)) => StreamStep::End(StreamOutcome::Failed(error)),
            // Producer went away without a terminal token
            None => StreamStep::End(StreamOutcome::Failed(
                "stream disconnected unexpectedly".to_string(),
            )),
        }
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl StreamProducer {
    /// Push a chunk; returns `false` once the consumer is gone
    pub async fn token(&self, text: impl Into<String>) -> bool {
        self.tx.send(StreamingToken::Token(text.into())).await.is_ok()
    }

    /// Finish the stream normally
    pub async fn complete(self) {
        let _ = self.tx.send(StreamingToken::Complete).await;
    }

    /// Finish the stream with an error
    pub async fn fail(self, error: impl Into<String>) {
        let _ = self.tx.send(StreamingToken::Error(error.into())).await;
    }

    /// Whether the consumer asked to stop
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the consumer asks to stop
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}
