//! Failure sink: append-only JSON Lines file of lines whose publish could
//! not be confirmed.
//!
//! Each record is serialized up front and written with a single append, so
//! a crash can at worst leave one torn record at the end; earlier records
//! are never rewritten. Opening a file whose last byte is not a newline
//! terminates the torn record first, so it cannot swallow the next append.
//! The engine never truncates or deletes this file.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use repush_types::failure::FailureRecord;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("cannot open failure file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot append to failure file {}: {source}", path.display())]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read failure file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot encode failure record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Open handle on the failure file for one pass.
#[derive(Debug)]
pub struct FailureSink {
    path: PathBuf,
    file: Option<File>,
    appended: u64,
}

impl FailureSink {
    /// Open `path` for appending, creating it and its parent directory.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Open`] if the file cannot be created or opened.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        let open_err = |source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(open_err)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(open_err)?;
        if terminate_torn_tail(&mut file).map_err(open_err)? {
            tracing::warn!(
                path = %path.display(),
                "Failure file ended mid-record, terminated it before appending"
            );
        }
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            appended: 0,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this handle.
    #[must_use]
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Append one record.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Append`] if the write fails.
    pub fn append(&mut self, record: &FailureRecord) -> Result<(), SinkError> {
        let mut payload = serde_json::to_vec(record)?;
        payload.push(b'\n');

        let file = self.file.as_mut().ok_or_else(|| SinkError::Append {
            path: self.path.clone(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, "sink already closed"),
        })?;
        file.write_all(&payload)
            .and_then(|()| file.flush())
            .map_err(|source| SinkError::Append {
                path: self.path.clone(),
                source,
            })?;
        self.appended += 1;
        Ok(())
    }

    /// Flush appended records to stable storage and release the handle.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Append`] if the records cannot be made durable.
    pub fn close(mut self) -> Result<(), SinkError> {
        self.sync_and_release()
    }

    fn sync_and_release(&mut self) -> Result<(), SinkError> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        if self.appended == 0 {
            return Ok(());
        }
        file.sync_data().map_err(|source| SinkError::Append {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for FailureSink {
    fn drop(&mut self) {
        if let Err(e) = self.sync_and_release() {
            tracing::warn!(error = %e, "Failure file not synced on release");
        }
    }
}

/// Append a newline if the file is non-empty and does not end with one.
/// Returns whether a newline was written.
fn terminate_torn_tail(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(false);
    }
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(true)
}

/// Contents of a failure file as read back for inspection.
#[derive(Debug, Default)]
pub struct FailureLog {
    pub records: Vec<FailureRecord>,
    /// Lines that did not parse as a record (e.g. torn by a crash mid-write).
    pub unreadable: usize,
}

/// Read every record in the failure file at `path`.
///
/// A missing file reads as empty.
///
/// # Errors
///
/// Returns [`SinkError::Read`] if the file exists but cannot be read.
pub fn read_failure_records(path: &Path) -> Result<FailureLog, SinkError> {
    let read_err = |source| SinkError::Read {
        path: path.to_path_buf(),
        source,
    };
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(FailureLog::default()),
        Err(err) => return Err(read_err(err)),
    };

    let mut log = FailureLog::default();
    for raw in BufReader::new(file).split(b'\n') {
        let raw = raw.map_err(read_err)?;
        if raw.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<FailureRecord>(&raw) {
            Ok(record) => log.records.push(record),
            Err(_) => log.unreadable += 1,
        }
    }
    Ok(log)
}
