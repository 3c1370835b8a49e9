//! JSON-file implementation of [`CheckpointStore`].
//!
//! The checkpoint is rewritten through a sibling temp file that is fsynced
//! and renamed over the target, so a crash leaves either the old or the new
//! value on disk.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use repush_types::checkpoint::Checkpoint;
use repush_types::state::{CheckpointState, ForwarderId};

use crate::backend::CheckpointStore;
use crate::error::{self, StateError};

/// File-backed checkpoint storage, one file per forwarder.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map_or_else(|| OsString::from("checkpoint"), OsString::from);
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn corrupt(&self, detail: impl Into<String>) -> StateError {
        StateError::Corrupt {
            location: self.path.display().to_string(),
            detail: detail.into(),
        }
    }

    /// Parse stored content. Accepts the JSON form written by [`save`] and a
    /// bare line number.
    ///
    /// [`save`]: CheckpointStore::save
    fn parse(&self, raw: &str) -> error::Result<Option<CheckpointState>> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if let Ok(state) = serde_json::from_str::<CheckpointState>(trimmed) {
            return Ok(Some(state));
        }
        let line: u64 = trimmed
            .parse()
            .map_err(|_| self.corrupt(format!("unrecognized content {:?}", truncate(trimmed))))?;
        Ok(Some(CheckpointState {
            line: Checkpoint::at(line),
            updated_at: self.modified_rfc3339().unwrap_or_default(),
        }))
    }

    fn modified_rfc3339(&self) -> Option<String> {
        let modified = fs::metadata(&self.path).ok()?.modified().ok()?;
        Some(DateTime::<Utc>::from(modified).to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(32) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, _forwarder: &ForwarderId) -> error::Result<Option<CheckpointState>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => self.parse(&raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                Err(self.corrupt("content is not valid UTF-8"))
            }
            Err(err) => Err(StateError::io(&self.path, err)),
        }
    }

    fn save(&self, _forwarder: &ForwarderId, state: &CheckpointState) -> error::Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(|e| StateError::io(parent, e))?;

        let tmp = self.tmp_path();
        let mut payload = serde_json::to_vec(state)?;
        payload.push(b'\n');

        let mut file = File::create(&tmp).map_err(|e| StateError::io(&tmp, e))?;
        file.write_all(&payload)
            .and_then(|()| file.sync_all())
            .map_err(|e| StateError::io(&tmp, e))?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|e| StateError::io(&self.path, e))?;
        sync_dir(parent).map_err(|e| StateError::io(parent, e))?;

        tracing::debug!(
            path = %self.path.display(),
            line = state.line.line(),
            "Checkpoint written"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("checkpoint file {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid() -> ForwarderId {
        ForwarderId::new("test")
    }

    #[test]
    fn missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("cp.json"));
        assert!(store.load(&fid()).unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("cp.json"));
        store
            .save(&fid(), &CheckpointState::now(Checkpoint::at(17)))
            .unwrap();

        let loaded = store.load(&fid()).unwrap().unwrap();
        assert_eq!(loaded.line, Checkpoint::at(17));
        assert!(!dir.path().join("cp.json.tmp").exists());
    }

    #[test]
    fn save_overwrites_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("cp.json"));
        store.save(&fid(), &CheckpointState::now(Checkpoint::at(3))).unwrap();
        store.save(&fid(), &CheckpointState::now(Checkpoint::at(9))).unwrap();
        assert_eq!(store.load(&fid()).unwrap().unwrap().line, Checkpoint::at(9));
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("nested/state/cp.json"));
        store.save(&fid(), &CheckpointState::now(Checkpoint::at(1))).unwrap();
        assert!(dir.path().join("nested/state/cp.json").exists());
    }

    #[test]
    fn bare_integer_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_line");
        fs::write(&path, "128\n").unwrap();

        let loaded = FileCheckpointStore::new(&path).load(&fid()).unwrap().unwrap();
        assert_eq!(loaded.line, Checkpoint::at(128));
        assert!(!loaded.updated_at.is_empty());
    }

    #[test]
    fn empty_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cp.json");
        fs::write(&path, "  \n").unwrap();
        assert!(FileCheckpointStore::new(&path).load(&fid()).unwrap().is_none());
    }

    #[test]
    fn garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cp.json");
        fs::write(&path, "{\"line\": \"abc\"").unwrap();

        let err = FileCheckpointStore::new(&path).load(&fid()).unwrap_err();
        assert!(err.is_corrupt(), "got: {err}");
    }

    #[test]
    fn negative_number_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cp.json");
        fs::write(&path, "-4").unwrap();
        assert!(FileCheckpointStore::new(&path).load(&fid()).unwrap_err().is_corrupt());
    }

    #[test]
    fn save_into_unwritable_location_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let store = FileCheckpointStore::new(blocker.join("cp.json"));
        let err = store
            .save(&fid(), &CheckpointState::now(Checkpoint::at(1)))
            .unwrap_err();
        assert!(matches!(err, StateError::Io { .. }), "got: {err}");
    }
}
