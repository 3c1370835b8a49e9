//! Resolution of configured resources: checkpoint backend selection and
//! the local half of `repush check`.

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use repush_state::{CheckpointStore, FileCheckpointStore, SqliteCheckpointStore};
use repush_types::state::ForwarderId;

use crate::config::types::{CheckpointBackendKind, ForwarderConfig};
use crate::result::{CheckItem, CheckReport};
use crate::source::LogSource;

/// Build the checkpoint store a config selects.
///
/// # Errors
///
/// Fails if the file backend has no path or the `SQLite` database cannot
/// be opened.
pub fn open_checkpoint_store(config: &ForwarderConfig) -> Result<Box<dyn CheckpointStore>> {
    match config.checkpoint.backend {
        CheckpointBackendKind::File => {
            let path = config
                .checkpoint
                .path
                .as_deref()
                .context("checkpoint.path is required for the file backend")?;
            Ok(Box::new(FileCheckpointStore::new(path)))
        }
        CheckpointBackendKind::Sqlite => {
            let store = if let Some(path) = &config.checkpoint.path {
                SqliteCheckpointStore::open(path).context("Failed to open checkpoint database")?
            } else {
                let path = repush_state::sqlite::default_database_path();
                SqliteCheckpointStore::open(&path)
                    .context("Failed to open default checkpoint database")?
            };
            Ok(Box::new(store))
        }
    }
}

/// Check the log file, checkpoint store, and failure sink without
/// modifying any of them.
#[must_use]
pub fn check_local_resources(config: &ForwarderConfig) -> CheckReport {
    tracing::info!(forwarder = config.forwarder, "Checking forwarder resources");
    let mut report = CheckReport::default();
    report.push(check_log_file(&config.source.path));
    report.push(check_checkpoint(config));
    report.push(check_failure_file(&config.failures.path));
    report
}

fn check_log_file(path: &Path) -> CheckItem {
    match LogSource::open(path) {
        Ok(source) => CheckItem::ok("Log file", format!("{} bytes", source.len_bytes())),
        Err(e) => CheckItem::failed("Log file", e.to_string()),
    }
}

fn check_checkpoint(config: &ForwarderConfig) -> CheckItem {
    let store = match open_checkpoint_store(config) {
        Ok(store) => store,
        Err(e) => return CheckItem::failed("Checkpoint", format!("{e:#}")),
    };
    match store.load(&ForwarderId::new(config.forwarder.clone())) {
        Ok(Some(state)) => CheckItem::ok(
            "Checkpoint",
            format!("{} (saved {})", state.line, state.updated_at),
        ),
        Ok(None) => CheckItem::ok("Checkpoint", "none saved, first pass starts at line 1"),
        // A corrupt checkpoint does not stop a pass; it restarts from line 1.
        Err(e) if e.is_corrupt() => CheckItem::ok(
            "Checkpoint",
            format!("unreadable, next pass starts at line 1 ({e})"),
        ),
        Err(e) => CheckItem::failed("Checkpoint", e.to_string()),
    }
}

fn check_failure_file(path: &Path) -> CheckItem {
    if path.exists() {
        return match OpenOptions::new().append(true).open(path) {
            Ok(_) => CheckItem::ok("Failure file", "appendable"),
            Err(e) => CheckItem::failed("Failure file", format!("{}: {e}", path.display())),
        };
    }
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut ancestor = Some(parent);
    while let Some(dir) = ancestor {
        if dir.exists() {
            return if dir.is_dir() {
                CheckItem::ok("Failure file", "will be created on first pass")
            } else {
                CheckItem::failed(
                    "Failure file",
                    format!("{} is not a directory", dir.display()),
                )
            };
        }
        ancestor = dir.parent();
    }
    CheckItem::ok("Failure file", "will be created on first pass")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::ConfigOverrides;
    use repush_types::checkpoint::Checkpoint;
    use repush_types::state::CheckpointState;

    fn config_in(dir: &Path) -> ForwarderConfig {
        let mut config = ForwarderConfig::default();
        ConfigOverrides {
            log_file: Some(dir.join("app.log")),
            checkpoint: Some(dir.join("app.checkpoint")),
            failure_file: Some(dir.join("out").join("failed.jsonl")),
            brokers: Some("localhost:9092".into()),
            topic: Some("logs".into()),
            cron: None,
        }
        .apply(&mut config);
        config
    }

    #[test]
    fn file_backend_requires_path() {
        let mut config = ForwarderConfig::default();
        config.checkpoint.path = None;
        let err = open_checkpoint_store(&config).err().unwrap();
        assert!(err.to_string().contains("checkpoint.path"));
    }

    #[test]
    fn sqlite_backend_opens_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.checkpoint.backend = CheckpointBackendKind::Sqlite;
        config.checkpoint.path = Some(dir.path().join("state.db"));

        let store = open_checkpoint_store(&config).unwrap();
        let id = ForwarderId::new("app");
        store
            .save(&id, &CheckpointState::now(Checkpoint::at(7)))
            .unwrap();
        assert_eq!(store.load(&id).unwrap().unwrap().line, Checkpoint::at(7));
        assert!(dir.path().join("state.db").exists());
    }

    #[test]
    fn check_passes_for_fresh_forwarder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.log"), "a\n").unwrap();
        let config = config_in(dir.path());

        let report = check_local_resources(&config);
        assert!(report.is_ok(), "{report:?}");
        assert_eq!(report.items.len(), 3);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn check_reports_missing_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let report = check_local_resources(&config);
        assert!(!report.is_ok());
        assert!(!report.items[0].ok);
        assert!(report.items[0].detail.contains("app.log"));
    }

    #[test]
    fn corrupt_checkpoint_is_not_a_check_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.log"), "a\n").unwrap();
        std::fs::write(dir.path().join("app.checkpoint"), "garbage").unwrap();
        let config = config_in(dir.path());

        let item = check_checkpoint(&config);
        assert!(item.ok);
        assert!(item.detail.contains("unreadable"));
    }

    #[test]
    fn failure_file_under_a_regular_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let item = check_failure_file(&blocker.join("failed.jsonl"));
        assert!(!item.ok);
    }
}
