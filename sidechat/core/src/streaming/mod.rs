//! Streaming Infrastructure
//!
//! Holds the transient state of the reply currently being generated. The
//! [`StreamAccumulator`] buffers chunks in arrival order until the session
//! controller folds them into a finished turn; [`StreamOutcome`] records how
//! the stream ended.
//!
//! # Example
//!
//! ```ignore
//! use sidechat_core::streaming::StreamAccumulator;
//!
//! let mut acc = StreamAccumulator::new();
//! acc.append("He");
//! acc.append("llo");
//! assert_eq!(acc.drain(), "Hello");
//! assert!(acc.is_empty());
//! ```

mod accumulator;

pub use accumulator::{StreamAccumulator, StreamStats};

/// How one stream of chunks ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Backend signalled the end of the reply
    Completed,
    /// The user cancelled the generation
    Cancelled,
    /// Transport or backend failure
    Failed(String),
}

impl StreamOutcome {
    /// Whether the user cancelled the generation
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Failure reason, if the stream failed
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            Self::Completed | Self::Cancelled => None,
        }
    }
}
