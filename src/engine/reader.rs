//! Streaming line reader with encoding support
//!
//! Reads only the lines appended since a known line number, streaming the
//! file in fixed-size chunks so memory use is independent of file size. The
//! game server writes UTF-16 LE with a BOM; plain UTF-8 is supported for
//! tooling-generated logs.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

const CHUNK_SIZE: usize = 8 * 1024;

/// Text encoding of a category's log files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogEncoding {
    Utf8,
    Utf16Le,
}

impl Default for LogEncoding {
    fn default() -> Self {
        LogEncoding::Utf16Le
    }
}

/// Result of one read pass over a log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBatch {
    /// Lines numbered `from_line..total_lines`, in file order
    pub new_lines: Vec<String>,
    /// Total number of lines currently in the file
    pub total_lines: u64,
}

/// Read all lines at index >= `from_line` (0-based) from the file.
///
/// A final unterminated line counts as a line. Failure to open or read the
/// file (locked, permissions) returns the error unchanged so the caller can
/// retry next tick without touching the checkpoint.
pub fn read_new_lines(
    path: &Path,
    from_line: u64,
    encoding: LogEncoding,
) -> Result<ReadBatch, RelayError> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);

    match encoding {
        LogEncoding::Utf8 => read_utf8(&mut reader, from_line),
        LogEncoding::Utf16Le => read_utf16_le(&mut reader, from_line),
    }
}

/// Count the lines in a file without materializing any of them.
///
/// Used for the first-run policy: seek past the historical backlog so a
/// freshly configured category does not replay thousands of old events.
pub fn count_lines(path: &Path, encoding: LogEncoding) -> Result<u64, RelayError> {
    Ok(read_new_lines(path, u64::MAX, encoding)?.total_lines)
}

fn read_utf8(reader: &mut impl Read, from_line: u64) -> Result<ReadBatch, RelayError> {
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut pending: Vec<u8> = Vec::new();
    let mut lines = LineCollector::new(from_line);
    let mut first_chunk = true;

    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        let mut bytes = &chunk[..n];
        if first_chunk {
            // UTF-8 BOM, written by some Windows tooling
            if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
                bytes = &bytes[3..];
            }
            first_chunk = false;
        }

        for &byte in bytes {
            if byte == b'\n' {
                lines.push(String::from_utf8_lossy(&pending).into_owned());
                pending.clear();
            } else {
                pending.push(byte);
            }
        }
    }

    if !pending.is_empty() {
        lines.push(String::from_utf8_lossy(&pending).into_owned());
    }

    Ok(lines.finish())
}

fn read_utf16_le(reader: &mut impl Read, from_line: u64) -> Result<ReadBatch, RelayError> {
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut carry: Option<u8> = None;
    let mut pending: Vec<u16> = Vec::new();
    let mut lines = LineCollector::new(from_line);
    let mut at_start = true;

    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }

        let mut units = Vec::with_capacity((n + 1) / 2);
        let mut bytes = chunk[..n].iter().copied();
        if let Some(low) = carry.take() {
            if let Some(high) = bytes.next() {
                units.push(u16::from_le_bytes([low, high]));
            } else {
                carry = Some(low);
            }
        }
        loop {
            match (bytes.next(), bytes.next()) {
                (Some(low), Some(high)) => units.push(u16::from_le_bytes([low, high])),
                (Some(low), None) => {
                    carry = Some(low);
                    break;
                }
                _ => break,
            }
        }

        for unit in units {
            if at_start {
                at_start = false;
                if unit == 0xFEFF {
                    continue; // BOM
                }
            }
            if unit == u16::from(b'\n') {
                lines.push(String::from_utf16_lossy(&pending));
                pending.clear();
            } else {
                pending.push(unit);
            }
        }
    }

    if !pending.is_empty() {
        lines.push(String::from_utf16_lossy(&pending));
    }

    Ok(lines.finish())
}

/// Counts every line but keeps only those at index >= `from_line`.
struct LineCollector {
    from_line: u64,
    total: u64,
    kept: Vec<String>,
}

impl LineCollector {
    fn new(from_line: u64) -> Self {
        Self {
            from_line,
            total: 0,
            kept: Vec::new(),
        }
    }

    fn push(&mut self, mut line: String) {
        if line.ends_with('\r') {
            line.pop();
        }
        if self.total >= self.from_line {
            self.kept.push(line);
        }
        self.total += 1;
    }

    fn finish(self) -> ReadBatch {
        ReadBatch {
            new_lines: self.kept,
            total_lines: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_utf16_le(path: &Path, text: &str, bom: bool) {
        let mut bytes = Vec::new();
        if bom {
            bytes.extend_from_slice(&[0xFF, 0xFE]);
        }
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_utf8_read_from_start() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kill_1.log");
        std::fs::write(&path, "one\ntwo\nthree\n").unwrap();

        let batch = read_new_lines(&path, 0, LogEncoding::Utf8).unwrap();
        assert_eq!(batch.total_lines, 3);
        assert_eq!(batch.new_lines, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_utf8_read_from_offset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kill_1.log");
        std::fs::write(&path, "one\ntwo\nthree\n").unwrap();

        let batch = read_new_lines(&path, 2, LogEncoding::Utf8).unwrap();
        assert_eq!(batch.total_lines, 3);
        assert_eq!(batch.new_lines, vec!["three"]);
    }

    #[test]
    fn test_offset_past_end_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kill_1.log");
        std::fs::write(&path, "one\ntwo\n").unwrap();

        let batch = read_new_lines(&path, 10, LogEncoding::Utf8).unwrap();
        assert_eq!(batch.total_lines, 2);
        assert!(batch.new_lines.is_empty());
    }

    #[test]
    fn test_crlf_and_unterminated_final_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kill_1.log");
        std::fs::write(&path, "one\r\ntwo\r\ntail").unwrap();

        let batch = read_new_lines(&path, 0, LogEncoding::Utf8).unwrap();
        assert_eq!(batch.total_lines, 3);
        assert_eq!(batch.new_lines, vec!["one", "two", "tail"]);
    }

    #[test]
    fn test_utf16_le_with_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kill_1.log");
        write_utf16_le(&path, "alpha\r\nbèta\r\n", true);

        let batch = read_new_lines(&path, 0, LogEncoding::Utf16Le).unwrap();
        assert_eq!(batch.total_lines, 2);
        assert_eq!(batch.new_lines, vec!["alpha", "bèta"]);
    }

    #[test]
    fn test_utf16_le_unicode_names_survive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat_1.log");
        write_utf16_le(&path, "Żółć killed 日本語\n", true);

        let batch = read_new_lines(&path, 0, LogEncoding::Utf16Le).unwrap();
        assert_eq!(batch.new_lines, vec!["Żółć killed 日本語"]);
    }

    #[test]
    fn test_utf16_le_spans_chunk_boundaries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kill_1.log");
        // Force many chunk boundaries: 3000 lines of 20+ chars each ≈ 130KB
        let text: String = (0..3000).map(|i| format!("line number {i:06}\n")).collect();
        write_utf16_le(&path, &text, true);

        let batch = read_new_lines(&path, 2998, LogEncoding::Utf16Le).unwrap();
        assert_eq!(batch.total_lines, 3000);
        assert_eq!(
            batch.new_lines,
            vec!["line number 002998", "line number 002999"]
        );
    }

    #[test]
    fn test_count_lines_keeps_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kill_1.log");
        std::fs::write(&path, "a\nb\nc\n").unwrap();

        assert_eq!(count_lines(&path, LogEncoding::Utf8).unwrap(), 3);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.log");
        assert!(read_new_lines(&path, 0, LogEncoding::Utf8).is_err());
    }

    #[test]
    fn test_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kill_1.log");
        std::fs::File::create(&path).unwrap().flush().unwrap();

        let batch = read_new_lines(&path, 0, LogEncoding::Utf8).unwrap();
        assert_eq!(batch.total_lines, 0);
        assert!(batch.new_lines.is_empty());
    }
}
