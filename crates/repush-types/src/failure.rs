//! Failure-sink record types.
//!
//! [`FailureRecord`] captures a line whose publish could not be confirmed
//! (or which could not be decoded at all) for out-of-band replay.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;

/// RFC 3339 formatted UTC timestamp string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    /// Wrap an existing RFC 3339 string.
    #[must_use]
    pub fn new(rfc3339: impl Into<String>) -> Self {
        Self(rfc3339.into())
    }

    /// Current UTC wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a line ended up in the failure sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The publisher reported a failure.
    Publish,
    /// The line could not be decoded and was never offered to the publisher.
    Malformed,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line plus the reason its publish did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// 1-based line ordinal in the source file.
    pub position: u64,
    /// Line content. Undecodable bytes are replaced with U+FFFD.
    pub line: String,
    /// Human-readable failure reason.
    pub reason: String,
    pub kind: FailureKind,
    pub failed_at: Timestamp,
    /// Exact line bytes, base64-encoded, when `line` is a lossy decoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_base64: Option<String>,
}

impl FailureRecord {
    /// Record for a line the publisher rejected.
    #[must_use]
    pub fn publish(position: u64, line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            position,
            line: line.into(),
            reason: reason.into(),
            kind: FailureKind::Publish,
            failed_at: Timestamp::now(),
            raw_base64: None,
        }
    }

    /// Record for a line that could not be decoded.
    #[must_use]
    pub fn malformed(position: u64, raw: &[u8], reason: impl Into<String>) -> Self {
        Self {
            position,
            line: String::from_utf8_lossy(raw).into_owned(),
            reason: reason.into(),
            kind: FailureKind::Malformed,
            failed_at: Timestamp::now(),
            raw_base64: Some(general_purpose::STANDARD.encode(raw)),
        }
    }

    /// The original line bytes, for replay.
    ///
    /// # Errors
    ///
    /// Fails if `raw_base64` is present but not valid base64.
    pub fn raw_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        match &self.raw_base64 {
            Some(encoded) => general_purpose::STANDARD.decode(encoded),
            None => Ok(self.line.as_bytes().to_vec()),
        }
    }
}
