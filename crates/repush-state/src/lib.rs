//! Checkpoint persistence for the repush forwarder.
//!
//! Provides the [`CheckpointStore`] trait with an atomic JSON-file
//! implementation ([`FileCheckpointStore`]) and a `SQLite` implementation
//! ([`SqliteCheckpointStore`]) for hosts that keep several forwarders'
//! progress in one database.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod file;
pub mod sqlite;

pub use backend::CheckpointStore;
pub use error::StateError;
pub use file::FileCheckpointStore;
pub use sqlite::SqliteCheckpointStore;
