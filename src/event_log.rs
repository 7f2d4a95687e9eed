/// Durable append-only event log shared across concurrent writers.
///
/// Every append is a single logical transaction: open the file in append
/// mode, take an exclusive whole-file lock, write one timestamped record,
/// unlock, close. No lock is held across calls, so independent writers
/// (including ones in other processes sharing the same file) can never
/// interleave partial records.
///
/// Lock acquisition waits under contention instead of failing; a record is
/// only ever lost to a real I/O failure, which the caller is expected to
/// divert to a fallback sink rather than discard.
use chrono::{DateTime, Local};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Handle to the shared log file. Cloneable; holds no open file between
/// appends.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

/// Errors that can occur while appending a record.
#[derive(Debug)]
pub enum LogError {
    /// Failed to open or create the log file.
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The exclusive file lock could not be taken.
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The record could not be written.
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogError::Open { path, source } => {
                write!(f, "failed to open log file {}: {}", path.display(), source)
            }
            LogError::Lock { path, source } => {
                write!(f, "failed to lock log file {}: {}", path.display(), source)
            }
            LogError::Write { path, source } => {
                write!(f, "failed to write log file {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for LogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LogError::Open { source, .. }
            | LogError::Lock { source, .. }
            | LogError::Write { source, .. } => Some(source),
        }
    }
}

impl EventLog {
    /// Create a handle for the log at `path`. The file itself is created
    /// lazily on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, `[YYYY-MM-DD HH:MM:SS] <message>`, stamped with
    /// local wall-clock time at the moment of the write.
    ///
    /// Blocks while another writer holds the file lock. Record order in the
    /// file is lock-acquisition order, which under scheduling jitter may
    /// differ from event-generation order.
    pub fn append(&self, message: &str) -> Result<(), LogError> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| LogError::Open {
                path: self.path.clone(),
                source: e,
            })?;

        file.lock_exclusive().map_err(|e| LogError::Lock {
            path: self.path.clone(),
            source: e,
        })?;

        let record = format_record(Local::now(), message);
        let outcome = (&file).write_all(record.as_bytes());
        let _ = FileExt::unlock(&file);

        outcome.map_err(|e| LogError::Write {
            path: self.path.clone(),
            source: e,
        })
    }
}

fn format_record(at: DateTime<Local>, message: &str) -> String {
    format!("[{}] {}\n", at.format("%Y-%m-%d %H:%M:%S"), message)
}
