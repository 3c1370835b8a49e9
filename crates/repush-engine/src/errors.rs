//! Fatal pass errors.
//!
//! Per-line publish failures never surface here; they go to the failure
//! sink. A [`PassError`] means the pass aborted and the checkpoint was not
//! advanced (or, for [`PassError::CheckpointSave`], may not have been).

use repush_state::StateError;

use crate::orchestrator::PassPhase;
use crate::sink::SinkError;
use crate::source::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("cannot save checkpoint to {location}: {source}")]
    CheckpointSave {
        location: String,
        #[source]
        source: StateError,
    },
}

impl PassError {
    /// Phase the pass had reached when it aborted.
    #[must_use]
    pub fn phase(&self) -> PassPhase {
        match self {
            Self::Source(SourceError::Open { .. }) | Self::Sink(SinkError::Open { .. }) => {
                PassPhase::CheckpointLoaded
            }
            Self::Source(_) | Self::Sink(_) | Self::CheckpointSave { .. } => PassPhase::Streaming,
        }
    }

    /// Which persistent resource failed.
    #[must_use]
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Source(_) => "log file",
            Self::Sink(_) => "failure file",
            Self::CheckpointSave { .. } => "checkpoint",
        }
    }
}
