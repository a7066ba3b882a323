//! Conversation History File
//!
//! Persists the conversation store as JSON so a conversation survives
//! restarts. The session controller rewrites the whole file after every
//! append; conversations are small and a full rewrite keeps the file
//! consistent with the store.
//!
//! Default location: `$XDG_DATA_HOME/sidechat/history.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::ChatTurn;

/// Current on-disk format version
const HISTORY_VERSION: u32 = 1;

/// Errors that can occur when reading or writing history
#[derive(Debug, Error)]
pub enum HistoryError {
    /// File could not be read or written
    #[error("history file {path}: {source}")]
    Io {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// File contents are not valid history JSON
    #[error("failed to parse history file {path}: {source}")]
    Parse {
        /// The path that was read
        path: PathBuf,
        /// The underlying decode error
        source: serde_json::Error,
    },

    /// Turns could not be encoded
    #[error("failed to encode history: {0}")]
    Encode(#[from] serde_json::Error),

    /// File was written by an incompatible version
    #[error("unsupported history version {0}")]
    UnsupportedVersion(u32),
}

#[derive(Serialize, Deserialize)]
struct HistoryDocument {
    version: u32,
    turns: Vec<ChatTurn>,
}

/// JSON file holding one conversation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryFile {
    path: PathBuf,
}

impl HistoryFile {
    /// Use the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default history location, if a data directory is known
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("sidechat").join("history.json"))
    }

    /// Path of the file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all persisted turns
    ///
    /// A missing file is an empty history.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub async fn load(&self) -> Result<Vec<ChatTurn>, HistoryError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No history file, starting fresh");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(HistoryError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let document: HistoryDocument =
            serde_json::from_str(&raw).map_err(|source| HistoryError::Parse {
                path: self.path.clone(),
                source,
            })?;

        if document.version != HISTORY_VERSION {
            return Err(HistoryError::UnsupportedVersion(document.version));
        }

        tracing::info!(
            path = %self.path.display(),
            turns = document.turns.len(),
            "Loaded conversation history"
        );
        Ok(document.turns)
    }

    /// Replace the file with the given turns
    ///
    /// Writes a sibling temp file and renames it into place so a crash never
    /// leaves a truncated history.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or any filesystem step fails.
    pub async fn save(&self, turns: &[ChatTurn]) -> Result<(), HistoryError> {
        #[derive(Serialize)]
        struct Borrowed<'a> {
            version: u32,
            turns: &'a [ChatTurn],
        }

        let json = serde_json::to_string_pretty(&Borrowed {
            version: HISTORY_VERSION,
            turns,
        })?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(source))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| self.io_error(source))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| self.io_error(source))?;

        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
