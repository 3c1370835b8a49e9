//! Checkpoint store error types.

use std::path::{Path, PathBuf};

/// Errors produced by [`CheckpointStore`](crate::CheckpointStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system I/O failure, with the path involved.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored checkpoint exists but cannot be interpreted.
    #[error("corrupt checkpoint at {location}: {detail}")]
    Corrupt { location: String, detail: String },

    /// Checkpoint could not be serialized.
    #[error("checkpoint encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("checkpoint store lock poisoned")]
    LockPoisoned,
}

impl StateError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error means the stored value is unreadable, as opposed
    /// to the store itself being unavailable.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_error_displays_context() {
        let inner = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some("table not found".into()),
        );
        let err = StateError::Sqlite(inner);
        assert!(err.to_string().contains("sqlite"));
    }

    #[test]
    fn io_error_names_path() {
        let err = StateError::io(
            Path::new("/var/lib/repush/app.checkpoint"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/var/lib/repush/app.checkpoint"), "got: {msg}");
        assert!(msg.contains("denied"));
    }

    #[test]
    fn corrupt_is_flagged() {
        let err = StateError::Corrupt {
            location: "cp.json".into(),
            detail: "not a number".into(),
        };
        assert!(err.is_corrupt());
        assert!(!StateError::LockPoisoned.is_corrupt());
    }
}
