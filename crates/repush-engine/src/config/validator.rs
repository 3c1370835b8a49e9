//! Semantic validation for parsed forwarder configuration values.

use anyhow::{bail, Result};

use crate::config::types::{CheckpointBackendKind, ForwarderConfig, CONFIG_VERSION};
use crate::schedule::Schedule;

fn validate_broker_address(addr: &str, errors: &mut Vec<String>) {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            if port.parse::<u16>().map_or(true, |p| p == 0) {
                errors.push(format!("broker '{addr}': invalid port '{port}'"));
            }
        }
        _ => errors.push(format!("broker '{addr}': expected host:port")),
    }
}

/// Validate a forwarder configuration.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns an error listing every validation failure found.
pub fn validate_config(config: &ForwarderConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.version != CONFIG_VERSION {
        errors.push(format!(
            "Unsupported config version '{}', expected '{CONFIG_VERSION}'",
            config.version
        ));
    }

    if config.forwarder.trim().is_empty() {
        errors.push("Forwarder name must not be empty".to_string());
    }

    let log_path = &config.source.path;
    if log_path.as_os_str().is_empty() {
        errors.push("source.path (log file) must be set".to_string());
    }

    match (&config.checkpoint.backend, &config.checkpoint.path) {
        (CheckpointBackendKind::File, None) => {
            errors.push("checkpoint.path must be set for the file backend".to_string());
        }
        (_, Some(path)) if path.as_os_str().is_empty() => {
            errors.push("checkpoint.path must not be empty".to_string());
        }
        (_, Some(path)) if path == log_path => {
            errors.push("checkpoint.path must differ from source.path".to_string());
        }
        _ => {}
    }

    let failure_path = &config.failures.path;
    if failure_path.as_os_str().is_empty() {
        errors.push("failures.path must be set".to_string());
    } else if failure_path == log_path {
        errors.push("failures.path must differ from source.path".to_string());
    } else if config.checkpoint.path.as_ref() == Some(failure_path) {
        errors.push("failures.path must differ from checkpoint.path".to_string());
    }

    if config.broker.brokers.is_empty() {
        errors.push("At least one broker must be configured".to_string());
    }
    for addr in &config.broker.brokers {
        validate_broker_address(addr, &mut errors);
    }

    if config.broker.topic.trim().is_empty() {
        errors.push("broker.topic must not be empty".to_string());
    }

    if config.broker.timeout_ms == 0 {
        errors.push("broker.timeout_ms must be > 0".to_string());
    }

    if let Some(expr) = &config.schedule.cron {
        if let Err(e) = Schedule::parse(expr) {
            errors.push(format!("schedule.cron: {e}"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Forwarder validation failed:\n  - {}", errors.join("\n  - "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse_config_str;

    fn valid_yaml() -> &'static str {
        r#"
version: "1.0"
forwarder: app
source:
  path: /var/log/app.log
checkpoint:
  path: /var/lib/repush/app.checkpoint
failures:
  path: /var/lib/repush/app.failed.jsonl
broker:
  brokers: ["localhost:9092"]
  topic: app-logs
"#
    }

    #[test]
    fn test_valid_config_passes() {
        let config = parse_config_str(valid_yaml()).unwrap();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_wrong_version_fails() {
        let yaml = valid_yaml().replace("\"1.0\"", "\"2.0\"");
        let config = parse_config_str(&yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("Unsupported config version"));
    }

    #[test]
    fn test_missing_checkpoint_path_for_file_backend() {
        let yaml = valid_yaml().replace("  path: /var/lib/repush/app.checkpoint\n", "  backend: file\n");
        let config = parse_config_str(&yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("checkpoint.path must be set"), "got: {err}");
    }

    #[test]
    fn test_sqlite_backend_may_omit_path() {
        let yaml = valid_yaml().replace("  path: /var/lib/repush/app.checkpoint\n", "  backend: sqlite\n");
        let config = parse_config_str(&yaml).unwrap();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_failure_file_must_not_be_log_file() {
        let yaml = valid_yaml().replace("/var/lib/repush/app.failed.jsonl", "/var/log/app.log");
        let config = parse_config_str(&yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("failures.path must differ from source.path"));
    }

    #[test]
    fn test_bad_broker_addresses() {
        let yaml = valid_yaml().replace("\"localhost:9092\"", "\"localhost\", \"kafka:0\", \":9092\"");
        let config = parse_config_str(&yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("broker 'localhost': expected host:port"), "got: {err}");
        assert!(err.contains("broker 'kafka:0': invalid port"), "got: {err}");
        assert!(err.contains("broker ':9092': expected host:port"), "got: {err}");
    }

    #[test]
    fn test_invalid_cron_fails() {
        let yaml = format!("{}schedule:\n  cron: \"every tuesday\"\n", valid_yaml());
        let config = parse_config_str(&yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("schedule.cron"), "got: {err}");
    }

    #[test]
    fn test_every_with_non_ascii_unit_is_a_validation_error() {
        let yaml = format!("{}schedule:\n  cron: \"@every 5é\"\n", valid_yaml());
        let config = parse_config_str(&yaml).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("unknown unit"), "got: {err}");
    }

    #[test]
    fn test_all_errors_reported_together() {
        let config = crate::config::types::ForwarderConfig::default();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("Forwarder name must not be empty"));
        assert!(err.contains("source.path"));
        assert!(err.contains("failures.path must be set"));
        assert!(err.contains("At least one broker"));
        assert!(err.contains("broker.topic"));
    }
}
