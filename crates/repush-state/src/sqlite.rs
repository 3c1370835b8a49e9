//! `SQLite`-backed implementation of [`CheckpointStore`].
//!
//! Uses a single `Mutex<Connection>` for thread safety. Each save is one
//! upsert statement, which `SQLite` applies atomically.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDateTime, Utc};
use repush_types::checkpoint::Checkpoint;
use repush_types::state::{CheckpointState, ForwarderId};
use rusqlite::Connection;

use crate::backend::CheckpointStore;
use crate::error::{self, StateError};

/// `SQLite` datetime format (UTC, no timezone suffix).
const SQLITE_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Idempotent DDL for the checkpoint table.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS checkpoints (
    forwarder TEXT PRIMARY KEY NOT NULL,
    line_no INTEGER NOT NULL CHECK (line_no >= 0),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

/// `SQLite`-backed checkpoint storage.
///
/// Create with [`SqliteCheckpointStore::open`] for file-backed persistence
/// or [`SqliteCheckpointStore::in_memory`] for tests.
pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
    location: String,
}

impl SqliteCheckpointStore {
    /// Open or create a checkpoint database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the directory can't be created,
    /// or [`StateError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StateError::io(parent, e))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: format!("checkpoint database {}", path.display()),
        })
    }

    /// Create an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Sqlite`] if the database can't be initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: "in-memory checkpoint database".to_string(),
        })
    }

    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }

    /// Convert a `SQLite` datetime string to RFC 3339.
    fn sqlite_to_rfc3339(raw: &str) -> String {
        NaiveDateTime::parse_from_str(raw, SQLITE_DATETIME_FMT).map_or_else(
            |_| raw.to_string(),
            |ndt| format!("{}Z", ndt.format("%Y-%m-%dT%H:%M:%S")),
        )
    }

    /// Convert an RFC 3339 string to `SQLite` datetime format.
    fn rfc3339_to_sqlite(iso: &str) -> String {
        chrono::DateTime::parse_from_rfc3339(iso).map_or_else(
            |_| Utc::now().format(SQLITE_DATETIME_FMT).to_string(),
            |dt| dt.with_timezone(&Utc).format(SQLITE_DATETIME_FMT).to_string(),
        )
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    fn load(&self, forwarder: &ForwarderId) -> error::Result<Option<CheckpointState>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            "SELECT line_no, updated_at FROM checkpoints WHERE forwarder = ?1",
            [forwarder.as_str()],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        );

        match result {
            Ok((line_no, updated_at)) => {
                let line = u64::try_from(line_no).map_err(|_| StateError::Corrupt {
                    location: self.location.clone(),
                    detail: format!("negative line number {line_no} for forwarder {forwarder}"),
                })?;
                Ok(Some(CheckpointState {
                    line: Checkpoint::at(line),
                    updated_at: Self::sqlite_to_rfc3339(&updated_at),
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, forwarder: &ForwarderId, state: &CheckpointState) -> error::Result<()> {
        let line_no = i64::try_from(state.line.line()).map_err(|_| StateError::Corrupt {
            location: self.location.clone(),
            detail: format!("line number {} exceeds storage range", state.line.line()),
        })?;
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO checkpoints (forwarder, line_no, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(forwarder) DO UPDATE SET line_no = ?2, updated_at = ?3",
            rusqlite::params![
                forwarder.as_str(),
                line_no,
                Self::rfc3339_to_sqlite(&state.updated_at),
            ],
        )?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.location.clone()
    }
}

impl std::fmt::Debug for SqliteCheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCheckpointStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Default database location when a config selects `sqlite` without a path.
#[must_use]
pub fn default_database_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".repush").join("state.db")
}
