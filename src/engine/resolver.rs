//! Active log file resolution
//!
//! Game servers rotate their logs into dated files like `kill_20240601.log`.
//! The resolver picks the single currently-active file for a category: the
//! one with the most recent creation time, ties broken by lexical path order
//! so repeated scans are deterministic.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::RelayError;

/// A candidate log file for a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileHandle {
    /// Path to the log file
    pub path: PathBuf,
    /// Creation time (falls back to mtime on filesystems without birth time)
    pub created: SystemTime,
}

/// Find the currently active log file for a category.
///
/// Matches files named `{category}_*.log` directly inside `dir`. Returns
/// `Ok(None)` when the directory is absent or holds no matching file; the
/// caller treats that as "category idle", not an error. A previously seen
/// file disappearing is rotation and shows up here as a different winner.
pub fn resolve_active_file(dir: &Path, category: &str) -> Result<Option<LogFileHandle>, RelayError> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let prefix = format!("{category}_");
    let mut active: Option<LogFileHandle> = None;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.starts_with(&prefix) || !file_name.ends_with(".log") {
            continue;
        }

        let metadata = entry.metadata()?;
        let created = metadata.created().or_else(|_| metadata.modified())?;

        let candidate = LogFileHandle { path, created };
        let wins = match &active {
            None => true,
            Some(current) => {
                candidate.created > current.created
                    || (candidate.created == current.created && candidate.path > current.path)
            }
        };
        if wins {
            active = Some(candidate);
        }
    }

    Ok(active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_missing_directory_is_none() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("no-such-dir");
        assert!(resolve_active_file(&missing, "kill").unwrap().is_none());
    }

    #[test]
    fn test_empty_directory_is_none() {
        let dir = tempdir().unwrap();
        assert!(resolve_active_file(dir.path(), "kill").unwrap().is_none());
    }

    #[test]
    fn test_ignores_other_categories_and_extensions() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("login_20240601.log"), "x").unwrap();
        fs::write(dir.path().join("kill_20240601.txt"), "x").unwrap();
        fs::write(dir.path().join("notes.log"), "x").unwrap();

        assert!(resolve_active_file(dir.path(), "kill").unwrap().is_none());
    }

    #[test]
    fn test_newest_creation_time_wins() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("kill_20240601.log");
        let new = dir.path().join("kill_20240701.log");
        fs::write(&old, "old").unwrap();
        // Ensure distinct timestamps even on coarse filesystem clocks
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(&new, "new").unwrap();

        let handle = resolve_active_file(dir.path(), "kill").unwrap().unwrap();
        assert_eq!(handle.path, new);
    }

    #[test]
    fn test_lexical_tiebreak_is_deterministic() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("kill_a.log");
        let b = dir.path().join("kill_b.log");
        fs::write(&a, "").unwrap();
        fs::write(&b, "").unwrap();

        // Pin identical timestamps so only the lexical rule decides
        let mtime = fs::metadata(&a).unwrap().modified().unwrap();
        let file = fs::OpenOptions::new().write(true).open(&b).unwrap();
        file.set_modified(mtime).ok();
        drop(file);

        let first = resolve_active_file(dir.path(), "kill").unwrap().unwrap();
        let second = resolve_active_file(dir.path(), "kill").unwrap().unwrap();
        assert_eq!(first.path, second.path);
    }
}
