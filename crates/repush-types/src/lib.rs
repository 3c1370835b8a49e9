//! Shared data model for the repush log forwarder.
//!
//! Pure data types with no I/O so the state, engine, and publisher crates
//! can share them without circular dependencies.

pub mod checkpoint;
pub mod failure;
pub mod line;
pub mod state;
