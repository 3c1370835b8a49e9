//! Checkpoint store trait definition.

use repush_types::state::{CheckpointState, ForwarderId};

use crate::error;

/// Storage contract for forwarder checkpoints.
///
/// Implementations must be `Send + Sync` for use behind `Box<dyn CheckpointStore>`.
pub trait CheckpointStore: Send + Sync {
    /// Read the checkpoint last saved for `forwarder`.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Corrupt`](crate::StateError::Corrupt) when a value
    /// exists but cannot be parsed, or another variant on storage failure.
    fn load(&self, forwarder: &ForwarderId) -> error::Result<Option<CheckpointState>>;

    /// Replace the checkpoint for `forwarder`.
    ///
    /// After a crash at any point, a subsequent [`load`](Self::load) sees
    /// either the previous value or `state`, never a mix.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::StateError) on storage failure.
    fn save(&self, forwarder: &ForwarderId, state: &CheckpointState) -> error::Result<()>;

    /// Human-readable location, used in log and error messages.
    fn describe(&self) -> String;
}
