//! Pass orchestrator: loads the checkpoint, streams new lines through the
//! publisher, records failures, and persists the new high-water mark.

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use repush_state::CheckpointStore;
use repush_types::checkpoint::Checkpoint;
use repush_types::failure::FailureRecord;
use repush_types::line::PublishOutcome;
use repush_types::state::{CheckpointState, ForwarderId};

use crate::config::types::{FailurePolicy, ForwarderConfig, TruncationPolicy};
use crate::errors::PassError;
use crate::publish::Publisher;
use crate::result::{PassCounts, PassReport};
use crate::sink::FailureSink;
use crate::source::{LogSource, SourceItem};

/// Where a pass is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPhase {
    Idle,
    CheckpointLoaded,
    ResourcesOpen,
    Streaming,
    CheckpointSaved,
    Closed,
    /// A fatal error ended the pass before its checkpoint was saved.
    Aborted,
}

impl fmt::Display for PassPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::CheckpointLoaded => "checkpoint_loaded",
            Self::ResourcesOpen => "resources_open",
            Self::Streaming => "streaming",
            Self::CheckpointSaved => "checkpoint_saved",
            Self::Closed => "closed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Everything a pass needs besides its checkpoint store and publisher.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub forwarder: ForwarderId,
    pub log_path: PathBuf,
    pub failure_path: PathBuf,
    pub failure_policy: FailurePolicy,
    pub truncation_policy: TruncationPolicy,
}

impl EngineSettings {
    #[must_use]
    pub fn from_config(config: &ForwarderConfig) -> Self {
        Self {
            forwarder: ForwarderId::new(config.forwarder.clone()),
            log_path: config.source.path.clone(),
            failure_path: config.failures.path.clone(),
            failure_policy: config.policy.on_publish_failure,
            truncation_policy: config.policy.on_truncation,
        }
    }
}

/// How one sweep over the source ended.
struct StreamEnd {
    high_water: Checkpoint,
    held: bool,
    truncated: bool,
}

/// Runs passes for one forwarder. Passes are strictly sequential; the
/// `&mut self` receiver enforces that at most one is in flight.
pub struct ForwardEngine<P: Publisher> {
    settings: EngineSettings,
    store: Box<dyn CheckpointStore>,
    publisher: P,
    phase: PassPhase,
}

impl<P: Publisher> ForwardEngine<P> {
    pub fn new(settings: EngineSettings, store: Box<dyn CheckpointStore>, publisher: P) -> Self {
        Self {
            settings,
            store,
            publisher,
            phase: PassPhase::Idle,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Phase reached by the most recent pass.
    #[must_use]
    pub fn phase(&self) -> PassPhase {
        self.phase
    }

    #[must_use]
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Execute one pass.
    ///
    /// # Errors
    ///
    /// Returns a [`PassError`] if the log file or failure sink cannot be
    /// opened, read, or written, or if the checkpoint cannot be saved.
    /// Publish failures and malformed lines are not errors.
    pub async fn run_once(&mut self) -> Result<PassReport, PassError> {
        let start = Instant::now();
        self.phase = PassPhase::Idle;

        let previous = self.load_checkpoint();
        self.phase = PassPhase::CheckpointLoaded;

        let result = self.execute(previous).await;
        match result {
            Ok((checkpoint, counts, truncation_detected, held)) => {
                self.phase = PassPhase::Closed;
                let report = PassReport {
                    forwarder: self.settings.forwarder.clone(),
                    previous,
                    checkpoint,
                    counts,
                    truncation_detected,
                    held,
                    duration_secs: start.elapsed().as_secs_f64(),
                };
                tracing::info!(
                    forwarder = %report.forwarder,
                    previous = previous.line(),
                    checkpoint = checkpoint.line(),
                    lines_read = counts.lines_read,
                    delivered = counts.delivered,
                    failed = counts.failed(),
                    duration_secs = report.duration_secs,
                    "Pass complete"
                );
                Ok(report)
            }
            Err(err) => {
                tracing::debug!(
                    forwarder = %self.settings.forwarder,
                    phase = %self.phase,
                    "Pass aborted"
                );
                self.phase = PassPhase::Aborted;
                Err(err)
            }
        }
    }

    /// Release the publisher's connections. Call once when no further
    /// passes will run.
    ///
    /// # Errors
    ///
    /// Propagates the publisher's close error.
    pub async fn close_publisher(&mut self) -> Result<(), crate::publish::PublishError> {
        self.publisher.close().await
    }

    fn load_checkpoint(&self) -> Checkpoint {
        match self.store.load(&self.settings.forwarder) {
            Ok(Some(state)) => {
                tracing::debug!(
                    forwarder = %self.settings.forwarder,
                    checkpoint = state.line.line(),
                    updated_at = %state.updated_at,
                    "Loaded checkpoint"
                );
                state.line
            }
            Ok(None) => {
                tracing::info!(
                    forwarder = %self.settings.forwarder,
                    store = %self.store.describe(),
                    "No checkpoint saved yet, starting from line 1"
                );
                Checkpoint::ZERO
            }
            Err(err) => {
                tracing::warn!(
                    forwarder = %self.settings.forwarder,
                    store = %self.store.describe(),
                    error = %err,
                    "Checkpoint unreadable, starting from line 1"
                );
                Checkpoint::ZERO
            }
        }
    }

    async fn execute(
        &mut self,
        previous: Checkpoint,
    ) -> Result<(Checkpoint, PassCounts, bool, bool), PassError> {
        let mut source = LogSource::open(&self.settings.log_path)?;
        let mut sink = FailureSink::open(&self.settings.failure_path)?;
        self.phase = PassPhase::ResourcesOpen;
        tracing::debug!(
            log = %source.path().display(),
            failures = %sink.path().display(),
            bytes = source.len_bytes(),
            "Pass resources open"
        );

        self.phase = PassPhase::Streaming;
        let mut counts = PassCounts::default();
        let mut end = self
            .stream(&mut source, &mut sink, previous, &mut counts)
            .await?;
        let truncation_detected = end.truncated;
        if end.truncated {
            match self.settings.truncation_policy {
                TruncationPolicy::Skip => {
                    tracing::warn!(
                        forwarder = %self.settings.forwarder,
                        checkpoint = previous.line(),
                        path = %self.settings.log_path.display(),
                        "Log file has fewer lines than the checkpoint, skipping"
                    );
                }
                TruncationPolicy::Restart => {
                    tracing::warn!(
                        forwarder = %self.settings.forwarder,
                        checkpoint = previous.line(),
                        path = %self.settings.log_path.display(),
                        "Log file has fewer lines than the checkpoint, forwarding from line 1"
                    );
                    end = self
                        .stream(&mut source, &mut sink, Checkpoint::ZERO, &mut counts)
                        .await?;
                }
            }
        }

        // Failure records must be durable before the checkpoint moves past them.
        sink.close()?;
        drop(source);

        let state = CheckpointState::now(end.high_water);
        self.store
            .save(&self.settings.forwarder, &state)
            .map_err(|source| PassError::CheckpointSave {
                location: self.store.describe(),
                source,
            })?;
        self.phase = PassPhase::CheckpointSaved;

        Ok((end.high_water, counts, truncation_detected, end.held))
    }

    async fn stream(
        &mut self,
        source: &mut LogSource,
        sink: &mut FailureSink,
        from: Checkpoint,
        counts: &mut PassCounts,
    ) -> Result<StreamEnd, PassError> {
        let mut high_water = from;
        let mut held = false;
        let mut lines = source.lines_after(from)?;

        for item in lines.by_ref() {
            let item = item?;
            counts.lines_read += 1;
            match item {
                SourceItem::Line(line) => match self.publisher.publish(line.payload()).await {
                    PublishOutcome::Delivered => {
                        counts.delivered += 1;
                        high_water = Checkpoint::at(line.position);
                    }
                    PublishOutcome::Failed(reason) => {
                        tracing::debug!(position = line.position, reason = %reason, "Publish failed");
                        sink.append(&FailureRecord::publish(line.position, line.text, reason))?;
                        counts.publish_failures += 1;
                        if self.settings.failure_policy == FailurePolicy::Hold {
                            held = true;
                            break;
                        }
                        high_water = Checkpoint::at(line.position);
                    }
                },
                SourceItem::Malformed {
                    position,
                    raw,
                    reason,
                } => {
                    tracing::debug!(position, reason = %reason, "Malformed line");
                    sink.append(&FailureRecord::malformed(position, &raw, reason))?;
                    counts.malformed += 1;
                    high_water = Checkpoint::at(position);
                }
            }
        }

        if lines.has_partial_tail() {
            tracing::debug!(
                lines_seen = lines.lines_seen(),
                "Unterminated last line deferred to a later pass"
            );
        }

        Ok(StreamEnd {
            high_water,
            held,
            truncated: !held && lines.truncated(),
        })
    }
}
