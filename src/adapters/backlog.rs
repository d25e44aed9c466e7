//! File-backed durable backlog snapshot.
//!
//! Implements [`PersistencePort`] over a newline-delimited file: one opaque
//! record per line, oldest line first, full replace on every write. No
//! append-only log, no checksums — the snapshot is written only when no
//! consumer is present and erased as soon as a drain completes, so it is
//! either absent or a complete copy of the backlog at spill time.
//!
//! On device the path lives on the SPIFFS mount; on host it is any
//! filesystem path (the tests use a temp dir). Open/write failures are
//! reported as typed errors and swallowed upstream — the in-memory backlog
//! stays authoritative for the session.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::warn;

use crate::app::ports::PersistencePort;
use crate::error::StorageError;
use crate::record::Record;

/// Longest line accepted on replay. Anything bigger is treated as
/// corruption and skipped.
const MAX_LINE_BYTES: usize = 1024;

pub struct FileBacklog {
    path: PathBuf,
}

impl FileBacklog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PersistencePort for FileBacklog {
    fn write_all(&mut self, records: &[Record]) -> Result<(), StorageError> {
        let mut contents = String::new();
        for record in records {
            contents.push_str(record.as_str());
            contents.push('\n');
        }
        fs::write(&self.path, contents).map_err(|e| {
            warn!("backlog write failed ({}): {e}", self.path.display());
            StorageError::Io
        })
    }

    fn read_all(&self) -> Result<Vec<Record>, StorageError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                warn!("backlog read failed ({}): {e}", self.path.display());
                return Err(StorageError::Io);
            }
        };

        let mut records = Vec::new();
        for line in contents.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            if line.len() > MAX_LINE_BYTES {
                warn!("backlog: skipping oversized line ({} bytes)", line.len());
                continue;
            }
            records.push(Record::new(line));
        }
        Ok(records)
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn remove(&mut self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("backlog remove failed ({}): {e}", self.path.display());
                Err(StorageError::Io)
            }
        }
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    fn rec(s: &str) -> Record {
        Record::new(s)
    }

    fn backlog_in(dir: &tempfile::TempDir) -> FileBacklog {
        FileBacklog::new(dir.path().join("backlog.jsonl"))
    }

    #[test]
    fn absent_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backlog = backlog_in(&dir);
        assert!(!backlog.exists());
        assert!(backlog.read_all().unwrap().is_empty());
    }

    #[test]
    fn write_read_roundtrip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut backlog = backlog_in(&dir);
        backlog.write_all(&[rec("a"), rec("b"), rec("c")]).unwrap();
        assert!(backlog.exists());

        let read: Vec<String> = backlog
            .read_all()
            .unwrap()
            .iter()
            .map(|r| r.as_str().to_string())
            .collect();
        assert_eq!(read, ["a", "b", "c"]);
    }

    #[test]
    fn write_replaces_prior_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut backlog = backlog_in(&dir);
        backlog.write_all(&[rec("old1"), rec("old2")]).unwrap();
        backlog.write_all(&[rec("new")]).unwrap();

        let read = backlog.read_all().unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].as_str(), "new");
    }

    #[test]
    fn blank_and_oversized_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backlog.jsonl");
        let big = "x".repeat(MAX_LINE_BYTES + 1);
        fs::write(&path, format!("good\n\n\n{big}\nalso-good\n")).unwrap();

        let backlog = FileBacklog::new(path);
        let read: Vec<String> = backlog
            .read_all()
            .unwrap()
            .iter()
            .map(|r| r.as_str().to_string())
            .collect();
        assert_eq!(read, ["good", "also-good"]);
    }

    #[test]
    fn crlf_line_endings_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backlog.jsonl");
        fs::write(&path, "one\r\ntwo\r\n").unwrap();

        let backlog = FileBacklog::new(path);
        let read: Vec<String> = backlog
            .read_all()
            .unwrap()
            .iter()
            .map(|r| r.as_str().to_string())
            .collect();
        assert_eq!(read, ["one", "two"]);
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut backlog = backlog_in(&dir);
        backlog.write_all(&[rec("a")]).unwrap();
        backlog.remove().unwrap();
        assert!(!backlog.exists());
        backlog.remove().unwrap();
    }

    #[test]
    fn empty_snapshot_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let mut backlog = backlog_in(&dir);
        backlog.write_all(&[]).unwrap();
        assert!(backlog.exists());
        assert!(backlog.read_all().unwrap().is_empty());
    }
}
