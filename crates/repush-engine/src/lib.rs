//! Forward-and-checkpoint engine for the repush log forwarder.
//!
//! One [`ForwardEngine::run_once`] call is a pass: load the checkpoint,
//! stream the lines appended since, hand each to a [`Publisher`], record
//! failures in the failure sink, and persist the new high-water mark.
//! The [`driver`] module runs passes once or on a schedule.

pub mod config;
pub mod driver;
pub mod errors;
pub mod orchestrator;
pub mod publish;
pub mod resolve;
pub mod result;
pub mod schedule;
pub mod sink;
pub mod source;

pub use errors::PassError;
pub use orchestrator::{EngineSettings, ForwardEngine, PassPhase};
pub use publish::{PublishError, Publisher};
pub use result::PassReport;
