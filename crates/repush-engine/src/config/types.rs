//! Forwarder configuration types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Supported configuration format version.
pub const CONFIG_VERSION: &str = "1.0";

/// Top-level forwarder configuration, usually parsed from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwarderConfig {
    #[serde(default = "default_version")]
    pub version: String,
    /// Forwarder name. Keys the checkpoint row in a shared database.
    #[serde(default)]
    pub forwarder: String,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub failures: FailuresConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            forwarder: String::new(),
            source: SourceConfig::default(),
            checkpoint: CheckpointConfig::default(),
            failures: FailuresConfig::default(),
            broker: BrokerConfig::default(),
            policy: PolicyConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Log file to forward.
    #[serde(default)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackendKind {
    #[default]
    File,
    Sqlite,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckpointConfig {
    #[serde(default)]
    pub backend: CheckpointBackendKind,
    /// Checkpoint file, or database file for the `sqlite` backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailuresConfig {
    /// Append-only JSON Lines file receiving failure records.
    #[serde(default)]
    pub path: PathBuf,
}

/// Broker acknowledgement level requested for each publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckMode {
    /// Wait for the full in-sync replica set.
    #[default]
    All,
    /// Wait for the partition leader only.
    Leader,
    /// Do not wait for any acknowledgement.
    None,
}

impl AckMode {
    /// Wire value of the `acks` field.
    #[must_use]
    pub fn required_acks(self) -> i16 {
        match self {
            Self::All => -1,
            Self::Leader => 1,
            Self::None => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    /// Bootstrap brokers as `host:port`.
    #[serde(default)]
    pub brokers: Vec<String>,
    #[serde(default)]
    pub topic: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub acks: AckMode,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra attempts per line after a retriable broker error.
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_client_id() -> String {
    "repush".to_string()
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    100
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: Vec::new(),
            topic: String::new(),
            client_id: default_client_id(),
            acks: AckMode::default(),
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// What happens to the checkpoint when the publisher rejects a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the line in the failure sink and move past it.
    #[default]
    Advance,
    /// Record the line, end the pass, and leave the checkpoint before it so
    /// the next pass retries it.
    Hold,
}

/// What happens when the checkpoint points past the end of the log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncationPolicy {
    /// Treat the file as having no new lines.
    #[default]
    Skip,
    /// Assume the file was rotated and forward it again from line 1.
    Restart,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    #[serde(default)]
    pub on_publish_failure: FailurePolicy,
    #[serde(default)]
    pub on_truncation: TruncationPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// `@every 30s`, `@hourly`, or a 5/6/7-field cron expression.
    #[serde(default)]
    pub cron: Option<String>,
}

/// Values supplied on the command line, applied over a parsed config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub log_file: Option<PathBuf>,
    pub checkpoint: Option<PathBuf>,
    pub failure_file: Option<PathBuf>,
    /// Broker list, space- or comma-separated.
    pub brokers: Option<String>,
    pub topic: Option<String>,
    pub cron: Option<String>,
}

impl ConfigOverrides {
    /// Overwrite every field of `config` that has an override.
    ///
    /// An empty forwarder name is derived from the log file stem.
    pub fn apply(&self, config: &mut ForwarderConfig) {
        if let Some(path) = &self.log_file {
            config.source.path.clone_from(path);
        }
        if let Some(path) = &self.checkpoint {
            config.checkpoint.path = Some(path.clone());
        }
        if let Some(path) = &self.failure_file {
            config.failures.path.clone_from(path);
        }
        if let Some(brokers) = &self.brokers {
            config.broker.brokers = split_brokers(brokers);
        }
        if let Some(topic) = &self.topic {
            config.broker.topic.clone_from(topic);
        }
        if let Some(cron) = &self.cron {
            config.schedule.cron = Some(cron.clone());
        }
        if config.forwarder.trim().is_empty() {
            if let Some(stem) = file_stem(&config.source.path) {
                config.forwarder = stem;
            }
        }
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
}

/// Split a broker list on whitespace and commas.
#[must_use]
pub fn split_brokers(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
