//! Checkpoint-store model types.

use serde::{Deserialize, Serialize};

use crate::checkpoint::Checkpoint;

/// Opaque forwarder identifier; keys persisted checkpoint state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForwarderId(String);

impl ForwarderId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ForwarderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Into<String>> From<S> for ForwarderId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

/// Snapshot of a persisted checkpoint.
///
/// `updated_at` is an RFC 3339 UTC string. Backends handle their own
/// storage format for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub line: Checkpoint,
    pub updated_at: String,
}

impl CheckpointState {
    /// Stamp `line` with the current time.
    #[must_use]
    pub fn now(line: Checkpoint) -> Self {
        Self {
            line,
            updated_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }
}
