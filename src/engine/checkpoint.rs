//! Durable per-category read positions
//!
//! Each category persists how far its log has been consumed as a small JSON
//! file. The wire format matches the checkpoint files the game-server tooling
//! ecosystem already uses (`CurrentLogFile` / `LastLineNumber` / `LastUpdate`),
//! so existing checkpoints survive an upgrade.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::RelayError;

/// How far a category's log has been consumed.
///
/// `last_line_number` is monotonically non-decreasing while `current_log_file`
/// is unchanged, and resets to 0 when the active file rotates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Absolute path of the log file the position refers to
    #[serde(rename = "CurrentLogFile")]
    pub current_log_file: String,
    /// Number of lines already consumed from that file
    #[serde(rename = "LastLineNumber")]
    pub last_line_number: u64,
    /// When the checkpoint was last written (ISO-8601)
    #[serde(rename = "LastUpdate")]
    pub last_update: DateTime<Utc>,
}

impl Checkpoint {
    /// Create a checkpoint for the given file and line, stamped now.
    pub fn new(log_file: impl Into<String>, last_line_number: u64) -> Self {
        Self {
            current_log_file: log_file.into(),
            last_line_number,
            last_update: Utc::now(),
        }
    }
}

/// Stores one checkpoint file per category under a common directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Create a store rooted at the given directory (created lazily on save).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the checkpoint file for a category.
    pub fn path_for(&self, category: &str) -> PathBuf {
        self.dir.join(format!("{category}.checkpoint.json"))
    }

    /// Load the checkpoint for a category.
    ///
    /// A missing or unreadable/corrupt file is treated as "no checkpoint" so
    /// the caller falls back to the first-run policy; corruption is logged.
    pub fn load(&self, category: &str) -> Option<Checkpoint> {
        let path = self.path_for(category);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(checkpoint) => Some(checkpoint),
            Err(e) => {
                warn!(
                    "Corrupt checkpoint for '{}' at {}, treating as absent: {}",
                    category,
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Persist a checkpoint atomically (write to a temp file, then rename).
    ///
    /// A crash mid-save leaves either the old or the new checkpoint on disk,
    /// never a partial write.
    pub fn save(&self, category: &str, checkpoint: &Checkpoint) -> Result<(), RelayError> {
        let path = self.path_for(category);
        std::fs::create_dir_all(&self.dir).map_err(|source| RelayError::Checkpoint {
            path: self.dir.clone(),
            source,
        })?;

        let json = serde_json::to_string_pretty(checkpoint)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|source| RelayError::Checkpoint {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &path).map_err(|source| RelayError::Checkpoint {
            path: path.clone(),
            source,
        })?;

        Ok(())
    }
}
