//! Session Controller
//!
//! Drives one conversation: accepts a user message, opens a streamed reply
//! from the backend, folds chunks into the stream accumulator, and finalizes
//! the reply into the conversation store.
//!
//! # State Machine
//!
//! ```text
//! Idle --send--> Sending --chunk--> Streaming --chunk--> Streaming
//!                   |                   |
//!                   +-------+-----------+
//!                           | complete / abort / failure
//!                           v
//!                      Finalizing --> Idle
//! ```
//!
//! Only one generation is in flight at a time. The guard lives here, not in
//! the surface: a `send` while busy is ignored.
//!
//! # Driving the Controller
//!
//! [`SessionController::send`] only records the user turn and queues the
//! request. Surfaces then pump the generation with
//! [`SessionController::next_step`] (cancel-safe, fits a `tokio::select!`
//! loop), [`SessionController::poll_streaming`] (never waits) or
//! [`SessionController::run_to_completion`]. [`SessionController::abort`]
//! works in both `Sending` and `Streaming`; the abort is observed on the
//! next step and yields an `aborted` turn unless the backend had already
//! finished the reply.
//!
//! State changes never wait on I/O. The history file is written afterwards
//! by a background task, so a step dropped mid-write leaves the controller
//! consistent and the write is picked up again by the next call.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, ChatBackend, ChatRequest, ChatStream, StreamStep};
use crate::conversation::ConversationStore;
use crate::history::{HistoryError, HistoryFile};
use crate::messages::{ChatTurn, NotifyLevel, SessionEvent};
use crate::streaming::{StreamAccumulator, StreamOutcome, StreamStats};

/// Session controller states
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No generation in flight
    #[default]
    Idle,
    /// User turn recorded, request issued, no chunk yet
    Sending,
    /// Chunks arriving
    Streaming,
    /// Folding the reply into a turn
    Finalizing,
}

impl SessionState {
    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idle => "Ready",
            Self::Sending => "Sending...",
            Self::Streaming => "Responding...",
            Self::Finalizing => "Finishing...",
        }
    }
}

/// Session controller configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Selected chat model; sends are ignored until one is set
    pub model: Option<String>,
    /// Record an aborted reply even when no chunk had arrived
    pub record_empty_aborted: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: None,
            record_empty_aborted: true,
        }
    }
}

/// Result of a [`SessionController::send`] call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// User turn recorded and a generation started
    Started,
    /// Nothing happened
    Ignored(IgnoreReason),
}

impl SendOutcome {
    /// Whether a generation was started
    #[must_use]
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }
}

/// Why a send was ignored
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Content was empty after trimming
    EmptyContent,
    /// No model is selected
    NoModel,
    /// A generation is already in flight
    Busy,
}

impl IgnoreReason {
    /// Short hint suitable for a status line
    #[must_use]
    pub fn hint(&self) -> &'static str {
        match self {
            Self::EmptyContent => "Nothing to send",
            Self::NoModel => "Select a model first",
            Self::Busy => "Still generating, abort or wait for the reply",
        }
    }
}

/// The generation currently in flight
struct InFlight {
    model: String,
    images: Option<Vec<String>>,
    cancel: CancellationToken,
    phase: Phase,
}

enum Phase {
    /// Waiting for the backend to open the stream
    Opening(BoxFuture<'static, Result<ChatStream, BackendError>>),
    /// Reading chunks
    Receiving(ChatStream),
}

/// What one step of the in-flight generation produced
enum Progress {
    Opened(Result<ChatStream, BackendError>),
    Step(StreamStep),
}

/// Streaming chat-session controller
///
/// Owns the conversation store and the stream accumulator; surfaces observe
/// them read-only through [`SessionController::store`],
/// [`SessionController::subscribe_turns`] and
/// [`SessionController::subscribe_events`].
pub struct SessionController<B: ChatBackend> {
    backend: Arc<B>,
    config: SessionConfig,
    store: ConversationStore,
    accumulator: StreamAccumulator,
    state: SessionState,
    in_flight: Option<InFlight>,
    last_outcome: Option<StreamOutcome>,
    history: Option<HistoryFile>,
    /// The store has turns the history file does not
    unsaved: bool,
    saving: Option<JoinHandle<Result<(), HistoryError>>>,
    event_subscribers: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

impl<B: ChatBackend + 'static> SessionController<B> {
    /// Create a controller with an empty conversation
    pub fn new(backend: B, config: SessionConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            config,
            store: ConversationStore::new(),
            accumulator: StreamAccumulator::new(),
            state: SessionState::Idle,
            in_flight: None,
            last_outcome: None,
            history: None,
            unsaved: false,
            saving: None,
            event_subscribers: Vec::new(),
        }
    }

    /// Continue an existing conversation
    #[must_use]
    pub fn with_store(mut self, store: ConversationStore) -> Self {
        self.store = store;
        self
    }

    /// Write the conversation to `history` after every append
    #[must_use]
    pub fn with_history(mut self, history: HistoryFile) -> Self {
        self.history = Some(history);
        self
    }

    /// The backend in use
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a generation is in flight
    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Selected model, if any
    pub fn model(&self) -> Option<&str> {
        self.config.model.as_deref()
    }

    /// Select the model for subsequent sends
    ///
    /// A generation already in flight keeps the model it was started with.
    pub fn set_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        tracing::info!(model = %model, "Selected chat model");
        self.config.model = Some(model);
    }

    /// Clear the selected model
    pub fn clear_model(&mut self) {
        self.config.model = None;
    }

    /// Read-only view of the conversation
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Observe turns appended to the conversation
    pub fn subscribe_turns(&mut self) -> mpsc::UnboundedReceiver<ChatTurn> {
        self.store.subscribe()
    }

    /// Observe controller events
    pub fn subscribe_events(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_subscribers.push(tx);
        rx
    }

    /// Reply text accumulated so far for the in-flight generation
    pub fn pending_content(&self) -> String {
        self.accumulator.content()
    }

    /// Statistics for the in-flight generation
    pub fn stream_stats(&self) -> &StreamStats {
        self.accumulator.stats()
    }

    /// How the most recent generation ended
    pub fn last_outcome(&self) -> Option<&StreamOutcome> {
        self.last_outcome.as_ref()
    }

    /// Record a user message and start a generation
    ///
    /// Empty content, a missing model or an in-flight generation make this a
    /// no-op. Otherwise the user turn is appended before the request is
    /// issued; the request carries every non-aborted turn. The controller is
    /// in `Sending` before the first await, so dropping the returned future
    /// only delays the history write.
    pub async fn send(
        &mut self,
        content: impl Into<String>,
        images: Option<Vec<String>>,
    ) -> SendOutcome {
        let content = content.into();
        if content.trim().is_empty() {
            return SendOutcome::Ignored(IgnoreReason::EmptyContent);
        }
        let Some(model) = self.config.model.clone().filter(|m| !m.trim().is_empty()) else {
            return SendOutcome::Ignored(IgnoreReason::NoModel);
        };
        if self.in_flight.is_some() {
            tracing::debug!("Send ignored, generation in flight");
            return SendOutcome::Ignored(IgnoreReason::Busy);
        }
        let images = images.filter(|images| !images.is_empty());

        self.accumulator.clear();
        self.record(ChatTurn::user(content, model.clone(), images.clone()));
        self.emit(SessionEvent::ScrollToLatest);

        let request = ChatRequest::new(model.clone(), self.store.outgoing_messages());
        tracing::info!(
            model = %model,
            messages = request.messages.len(),
            backend = self.backend.name(),
            "Starting generation"
        );

        let backend = Arc::clone(&self.backend);
        let opening = async move { backend.chat(request).await }.boxed();

        self.in_flight = Some(InFlight {
            model,
            images,
            cancel: CancellationToken::new(),
            phase: Phase::Opening(opening),
        });
        self.set_state(SessionState::Sending);

        self.persist().await;
        SendOutcome::Started
    }

    /// Cancel the in-flight generation
    ///
    /// Returns `false` (and changes nothing) when nothing is in flight. The
    /// aborted turn is recorded on the next step. A reply the backend had
    /// already finished is recorded as completed.
    pub fn abort(&mut self) -> bool {
        let Some(in_flight) = self.in_flight.as_ref() else {
            return false;
        };

        if !in_flight.cancel.is_cancelled() {
            tracing::info!(state = ?self.state, "Aborting generation");
        }
        in_flight.cancel.cancel();
        if let Phase::Receiving(stream) = &in_flight.phase {
            stream.cancel();
        }
        true
    }

    /// Wait for and apply one step of the in-flight generation
    ///
    /// Returns `false` when nothing is in flight. Cancel-safe: every step is
    /// applied without suspending, and a history write cut short is resumed
    /// by the next call.
    pub async fn next_step(&mut self) -> bool {
        self.persist().await;

        let progress = {
            let Some(InFlight { cancel, phase, .. }) = self.in_flight.as_mut() else {
                return false;
            };

            match phase {
                Phase::Opening(opening) => tokio::select! {
                    biased;
                    () = cancel.cancelled() => Progress::Step(StreamStep::End(StreamOutcome::Cancelled)),
                    opened = opening => Progress::Opened(opened),
                },
                Phase::Receiving(stream) => Progress::Step(
                    stream
                        .next()
                        .await
                        .unwrap_or(StreamStep::End(StreamOutcome::Cancelled)),
                ),
            }
        };

        self.apply(progress);
        self.persist().await;
        true
    }

    /// Apply everything that is ready without waiting
    ///
    /// Returns `true` if anything happened.
    pub async fn poll_streaming(&mut self) -> bool {
        let mut activity = false;

        loop {
            let progress = {
                let Some(InFlight { cancel, phase, .. }) = self.in_flight.as_mut() else {
                    break;
                };

                match phase {
                    Phase::Opening(_) if cancel.is_cancelled() => {
                        Progress::Step(StreamStep::End(StreamOutcome::Cancelled))
                    }
                    Phase::Opening(opening) => match opening.now_or_never() {
                        Some(opened) => Progress::Opened(opened),
                        None => break,
                    },
                    Phase::Receiving(stream) => match stream.try_next() {
                        Some(step) => Progress::Step(step),
                        None => break,
                    },
                }
            };

            self.apply(progress);
            activity = true;
        }

        if activity {
            self.persist().await;
        }
        activity
    }

    /// Drive the in-flight generation to its end
    ///
    /// Returns the outcome, or `None` if nothing was in flight.
    pub async fn run_to_completion(&mut self) -> Option<StreamOutcome> {
        if self.in_flight.is_none() {
            return None;
        }
        while self.next_step().await {}
        self.last_outcome.clone()
    }

    /// Wait until the conversation on disk matches the store
    ///
    /// Failures are reported as a warning notification, like any other
    /// history write.
    pub async fn flush_history(&mut self) {
        self.persist().await;
    }

    fn apply(&mut self, progress: Progress) {
        match progress {
            Progress::Opened(Ok(stream)) => {
                tracing::debug!("Chat stream opened");
                if let Some(in_flight) = self.in_flight.as_mut() {
                    // An abort that raced the open still wins
                    if in_flight.cancel.is_cancelled() {
                        stream.cancel();
                    }
                    in_flight.phase = Phase::Receiving(stream);
                }
            }
            Progress::Opened(Err(e)) if e.is_cancelled() => {
                self.finalize(StreamOutcome::Cancelled);
            }
            Progress::Opened(Err(e)) => {
                self.finalize(StreamOutcome::Failed(e.to_string()));
            }
            Progress::Step(StreamStep::Chunk(text)) => {
                self.accumulator.append(text.as_str());
                if self.state != SessionState::Streaming {
                    self.set_state(SessionState::Streaming);
                }
                self.emit(SessionEvent::Token { text });
                self.emit(SessionEvent::ScrollToLatest);
            }
            Progress::Step(StreamStep::End(outcome)) => {
                self.finalize(outcome);
            }
        }
    }

    /// Fold the accumulated reply into a turn and return to idle
    ///
    /// Never suspends; the history write happens afterwards in `persist`.
    fn finalize(&mut self, outcome: StreamOutcome) {
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };
        self.set_state(SessionState::Finalizing);

        let stats = self.accumulator.stats().clone();
        let content = self.accumulator.drain();
        let aborted = outcome.is_cancelled();

        if aborted && content.is_empty() && !self.config.record_empty_aborted {
            tracing::debug!("Discarding empty aborted reply");
        } else {
            self.record(ChatTurn::assistant(
                content,
                in_flight.model,
                in_flight.images,
                aborted,
            ));
        }

        let duration_ms = stats
            .duration()
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        if let Some(reason) = outcome.failure() {
            tracing::warn!(
                chunks = stats.chunks_received,
                bytes = stats.bytes_received,
                error = %reason,
                "Generation failed"
            );
            self.notify(NotifyLevel::Error, format!("Generation failed: {reason}"));
        } else {
            tracing::info!(
                chunks = stats.chunks_received,
                bytes = stats.bytes_received,
                duration_ms,
                aborted,
                "Generation finished"
            );
        }

        self.emit(SessionEvent::ScrollToLatest);
        self.last_outcome = Some(outcome);
        self.set_state(SessionState::Idle);
    }

    /// Append a turn and mark the history file stale
    fn record(&mut self, turn: ChatTurn) {
        self.store.append(turn);
        if self.history.is_some() {
            self.unsaved = true;
        }
    }

    /// Bring the history file up to date with the store
    ///
    /// Writes run in their own task. Dropping this future leaves the write
    /// running; the next call waits for it before starting another, so the
    /// file only ever moves forward.
    async fn persist(&mut self) {
        self.settle_save().await;
        if !self.unsaved {
            return;
        }
        self.unsaved = false;
        let Some(history) = self.history.clone() else {
            return;
        };

        let turns = self.store.snapshot().to_vec();
        self.saving = Some(tokio::spawn(async move { history.save(&turns).await }));
        self.settle_save().await;
    }

    /// Wait for the running history write, if any, and report its result
    async fn settle_save(&mut self) {
        let Some(saving) = self.saving.as_mut() else {
            return;
        };
        let result = saving.await;
        self.saving = None;

        let error = match result {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };
        tracing::warn!(error = %error, "Failed to save conversation history");
        self.notify(NotifyLevel::Warning, format!("Conversation not saved: {error}"));
    }

    /// Set state and notify surfaces
    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.emit(SessionEvent::State { state });
    }

    fn notify(&mut self, level: NotifyLevel, message: String) {
        self.emit(SessionEvent::Notify { level, message });
    }

    fn emit(&mut self, event: SessionEvent) {
        self.event_subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

impl<B: ChatBackend> std::fmt::Debug for SessionController<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("backend", &self.backend.name())
            .field("state", &self.state)
            .field("model", &self.config.model)
            .field("turns", &self.store.len())
            .field("generating", &self.in_flight.is_some())
            .finish_non_exhaustive()
    }
}
