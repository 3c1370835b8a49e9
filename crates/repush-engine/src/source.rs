//! Log source: the lines appended after a checkpoint.
//!
//! Only newline-terminated lines count. A trailing fragment without `\n`
//! may still be mid-write, so it is left for a later pass. Each
//! [`LogSource::lines_after`] call reads from the start of the file and is
//! bounded by the file length captured at [`LogSource::open`], so lines
//! appended during a pass are not observed.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Take};
use std::path::{Path, PathBuf};

use repush_types::checkpoint::Checkpoint;
use repush_types::line::Line;

/// Errors reading the log file. All are fatal for the pass.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("cannot open log file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed reading log file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One candidate line produced by [`LinesAfter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceItem {
    Line(Line),
    /// A line that could not be decoded as UTF-8.
    Malformed {
        position: u64,
        raw: Vec<u8>,
        reason: String,
    },
}

impl SourceItem {
    #[must_use]
    pub fn position(&self) -> u64 {
        match self {
            Self::Line(line) => line.position,
            Self::Malformed { position, .. } => *position,
        }
    }
}

/// An open log file.
#[derive(Debug)]
pub struct LogSource {
    path: PathBuf,
    file: File,
    bound: u64,
}

impl LogSource {
    /// Open `path` and capture its current length.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Open`] if the file is missing or unreadable.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let open_err = |source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(open_err)?;
        let metadata = file.metadata().map_err(open_err)?;
        if metadata.is_dir() {
            return Err(open_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "is a directory",
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            file,
            bound: metadata.len(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File length in bytes when the source was opened.
    #[must_use]
    pub fn len_bytes(&self) -> u64 {
        self.bound
    }

    /// Every complete line with ordinal strictly greater than `checkpoint`,
    /// in file order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Read`] if the file cannot be rewound.
    pub fn lines_after(&mut self, checkpoint: Checkpoint) -> Result<LinesAfter<'_>, SourceError> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|source| SourceError::Read {
                path: self.path.clone(),
                source,
            })?;
        Ok(LinesAfter {
            reader: BufReader::new(self.file.by_ref().take(self.bound)),
            path: &self.path,
            checkpoint,
            position: 0,
            buf: Vec::new(),
            exhausted: false,
            partial_tail: false,
        })
    }
}

/// Lazy, finite sequence of lines after a checkpoint.
pub struct LinesAfter<'a> {
    reader: BufReader<Take<&'a mut File>>,
    path: &'a Path,
    checkpoint: Checkpoint,
    position: u64,
    buf: Vec<u8>,
    exhausted: bool,
    partial_tail: bool,
}

impl LinesAfter<'_> {
    /// Complete lines read so far, including those at or before the checkpoint.
    #[must_use]
    pub fn lines_seen(&self) -> u64 {
        self.position
    }

    /// Whether the file held fewer complete lines than the checkpoint names.
    /// Only meaningful once the sequence is exhausted.
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.exhausted && self.position < self.checkpoint.line()
    }

    /// Whether an unterminated fragment was left at the end of the file.
    #[must_use]
    pub fn has_partial_tail(&self) -> bool {
        self.partial_tail
    }

    fn decode(&mut self) -> SourceItem {
        let mut raw = std::mem::take(&mut self.buf);
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        match String::from_utf8(raw) {
            Ok(text) => SourceItem::Line(Line::new(self.position, text)),
            Err(err) => {
                let reason = format!("invalid UTF-8 at byte {}", err.utf8_error().valid_up_to());
                SourceItem::Malformed {
                    position: self.position,
                    raw: err.into_bytes(),
                    reason,
                }
            }
        }
    }
}

impl Iterator for LinesAfter<'_> {
    type Item = Result<SourceItem, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.exhausted {
            self.buf.clear();
            let read = match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(n) => n,
                Err(source) => {
                    self.exhausted = true;
                    return Some(Err(SourceError::Read {
                        path: self.path.to_path_buf(),
                        source,
                    }));
                }
            };
            if read == 0 {
                self.exhausted = true;
                break;
            }
            if self.buf.last() != Some(&b'\n') {
                self.partial_tail = true;
                self.exhausted = true;
                break;
            }
            self.position += 1;
            if self.checkpoint.covers(self.position) {
                continue;
            }
            return Some(Ok(self.decode()));
        }
        None
    }
}
