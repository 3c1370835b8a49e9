pub mod check;
pub mod failures;
pub mod run;
pub mod schedule;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::watch;

use repush_engine::config::parser;
use repush_engine::config::types::{ConfigOverrides, ForwarderConfig};
use repush_engine::config::validator;
use repush_engine::resolve::open_checkpoint_store;
use repush_engine::{EngineSettings, ForwardEngine};
use repush_kafka::{KafkaPublisher, ProducerConfig};

/// Where the forwarder's files and broker are, from a YAML file and/or flags.
/// Flags win over the file.
#[derive(Args, Debug, Clone, Default)]
pub struct ForwarderArgs {
    /// Forwarder YAML file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Log file to forward
    #[arg(long, alias = "log-name")]
    pub log_file: Option<PathBuf>,
    /// Checkpoint file (or database for the sqlite backend)
    #[arg(long, alias = "last-line-name")]
    pub checkpoint: Option<PathBuf>,
    /// Append-only file receiving lines that failed to publish
    #[arg(long, alias = "fail-name")]
    pub failure_file: Option<PathBuf>,
    /// Kafka bootstrap brokers, space- or comma-separated `host:port`
    #[arg(long)]
    pub broker: Option<String>,
    /// Kafka topic
    #[arg(long)]
    pub topic: Option<String>,
}

impl ForwarderArgs {
    fn overrides(&self, cron: Option<String>) -> ConfigOverrides {
        ConfigOverrides {
            log_file: self.log_file.clone(),
            checkpoint: self.checkpoint.clone(),
            failure_file: self.failure_file.clone(),
            brokers: self.broker.clone(),
            topic: self.topic.clone(),
            cron,
        }
    }

    /// Effective configuration without validation.
    pub fn load(&self, cron: Option<String>) -> Result<ForwarderConfig> {
        let config = parser::load_config(self.config.as_deref(), &self.overrides(cron));
        match &self.config {
            Some(path) => {
                config.with_context(|| format!("Failed to load forwarder: {}", path.display()))
            }
            None => config,
        }
    }

    /// Effective configuration, validated.
    pub fn load_validated(&self, cron: Option<String>) -> Result<ForwarderConfig> {
        let config = self.load(cron)?;
        validator::validate_config(&config)?;
        tracing::info!(
            forwarder = config.forwarder,
            log = %config.source.path.display(),
            topic = config.broker.topic,
            brokers = config.broker.brokers.len(),
            "Forwarder validated"
        );
        Ok(config)
    }
}

/// Wire up the checkpoint store and Kafka publisher for `config`.
pub fn build_engine(config: &ForwarderConfig) -> Result<ForwardEngine<KafkaPublisher>> {
    let store = open_checkpoint_store(config)?;
    let publisher = KafkaPublisher::new(ProducerConfig::from_broker_config(&config.broker))
        .context("Failed to configure Kafka producer")?;
    tracing::debug!(
        store = %store.describe(),
        publisher = %repush_engine::Publisher::describe(&publisher),
        "Engine resources resolved"
    );
    Ok(ForwardEngine::new(
        EngineSettings::from_config(config),
        store,
        publisher,
    ))
}

/// Receiver that flips to `true` on Ctrl-C or, on unix, SIGTERM.
pub fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown requested, finishing current pass");
        let _ = tx.send(true);
    });
    rx
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for SIGTERM, only Ctrl-C stops the run");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
