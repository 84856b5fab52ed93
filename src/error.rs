//! Domain error types for the relay engine
//!
//! The tick scheduler decides log level and retry policy centrally based on
//! these variants; lower layers only classify, they never log-and-swallow.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the log-relay engine.
#[derive(Debug, Error)]
pub enum RelayError {
    /// File or directory I/O failure (locked file, permissions, vanished dir).
    /// Transient: retried on the next tick with the checkpoint unchanged.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Checkpoint file could not be written.
    #[error("failed to persist checkpoint at {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A grammar rule failed to compile at startup.
    #[error("invalid grammar for category '{category}': {reason}")]
    Grammar { category: String, reason: String },

    /// HTTP transport failure (connect error, request timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The delivery sink rejected the request, or retries were exhausted.
    #[error("delivery failed with status {status}")]
    Delivery { status: u16 },
}

impl RelayError {
    /// Whether the error is expected to resolve by itself on a later tick.
    ///
    /// Transient errors are logged at debug level by the scheduler; everything
    /// else is a warning.
    pub fn is_transient(&self) -> bool {
        matches!(self, RelayError::Io(_))
    }
}
