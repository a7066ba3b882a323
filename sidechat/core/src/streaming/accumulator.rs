//! Stream Accumulator Implementation
//!
//! Ordered, append-only buffer of the chunks received for the in-flight
//! assistant reply.

use std::time::{Duration, Instant};

/// Statistics for the generation currently being accumulated
#[derive(Clone, Debug, Default)]
pub struct StreamStats {
    /// Chunks received
    pub chunks_received: u32,
    /// Bytes of content received
    pub bytes_received: usize,
    /// When the first chunk arrived
    pub started_at: Option<Instant>,
    /// When the latest chunk arrived
    pub last_chunk_at: Option<Instant>,
}

impl StreamStats {
    /// Time from the first to the latest chunk
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        Some(self.last_chunk_at?.duration_since(self.started_at?))
    }
}

/// Buffer of partial content for one generation
///
/// Chunks are kept exactly as delivered; joining inserts no separator. No
/// size limit is enforced here.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    chunks: Vec<String>,
    stats: StreamStats,
}

impl StreamAccumulator {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk to the end
    pub fn append(&mut self, chunk: impl Into<String>) {
        let chunk = chunk.into();
        let now = Instant::now();

        self.stats.chunks_received += 1;
        self.stats.bytes_received += chunk.len();
        self.stats.started_at.get_or_insert(now);
        self.stats.last_chunk_at = Some(now);

        self.chunks.push(chunk);
    }

    /// Joined content so far, without clearing
    #[must_use]
    pub fn content(&self) -> String {
        self.chunks.concat()
    }

    /// Return the joined content and reset for the next generation
    pub fn drain(&mut self) -> String {
        let content = self.chunks.concat();
        self.clear();
        content
    }

    /// Drop all buffered chunks and statistics
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.stats = StreamStats::default();
    }

    /// Whether no chunk has been buffered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of buffered chunks
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Statistics for the current generation
    #[must_use]
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }
}
