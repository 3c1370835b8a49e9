//! Forwarder YAML parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::types::{ConfigOverrides, ForwarderConfig};

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut missing = Vec::new();
    let result = ENV_VAR_RE.replace_all(input, |cap: &regex::Captures<'_>| {
        std::env::var(&cap[1]).unwrap_or_else(|_| {
            missing.push(cap[1].to_string());
            String::new()
        })
    });

    if !missing.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", missing.join(", "));
    }

    Ok(result.into_owned())
}

/// Parse a forwarder YAML string (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails or the YAML is invalid.
pub fn parse_config_str(yaml_str: &str) -> Result<ForwarderConfig> {
    let substituted = substitute_env_vars(yaml_str)?;
    let config: ForwarderConfig =
        serde_yaml::from_str(&substituted).context("Failed to parse forwarder YAML")?;
    Ok(config)
}

/// Parse a forwarder YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn parse_config(path: &Path) -> Result<ForwarderConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read forwarder config: {}", path.display()))?;
    parse_config_str(&content)
}

/// Build the effective configuration: the file at `path` if given (defaults
/// otherwise), with `overrides` applied on top. Does not validate.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or parsed.
pub fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<ForwarderConfig> {
    let mut config = match path {
        Some(path) => parse_config(path)?,
        None => ForwarderConfig::default(),
    };
    overrides.apply(&mut config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{AckMode, CheckpointBackendKind, FailurePolicy};

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("RP_TEST_BROKER", "kafka-1:9092");
        let input = "brokers: [${RP_TEST_BROKER}]";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "brokers: [kafka-1:9092]");
        std::env::remove_var("RP_TEST_BROKER");
    }

    #[test]
    fn test_no_env_vars_passthrough() {
        let input = "topic: logs\nforwarder: app";
        assert_eq!(substitute_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_multiple_missing_env_vars_all_reported() {
        let err = substitute_env_vars("${RP_MISSING_X} and ${RP_MISSING_Y}")
            .unwrap_err()
            .to_string();
        assert!(err.contains("RP_MISSING_X"));
        assert!(err.contains("RP_MISSING_Y"));
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
version: "1.0"
forwarder: nginx-access
source:
  path: /var/log/nginx/access.log
checkpoint:
  backend: sqlite
  path: /var/lib/repush/state.db
failures:
  path: /var/lib/repush/access.failed.jsonl
broker:
  brokers: ["kafka-1:9092", "kafka-2:9092"]
  topic: nginx-access
  acks: leader
  retries: 5
policy:
  on_publish_failure: hold
schedule:
  cron: "*/5 * * * *"
"#;
        let config = parse_config_str(yaml).unwrap();
        assert_eq!(config.forwarder, "nginx-access");
        assert_eq!(config.checkpoint.backend, CheckpointBackendKind::Sqlite);
        assert_eq!(config.broker.brokers.len(), 2);
        assert_eq!(config.broker.acks, AckMode::Leader);
        assert_eq!(config.broker.retries, 5);
        assert_eq!(config.broker.timeout_ms, 10_000);
        assert_eq!(config.policy.on_publish_failure, FailurePolicy::Hold);
        assert_eq!(config.schedule.cron.as_deref(), Some("*/5 * * * *"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "forwarder: app\nsource:\n  path: a.log\n  follow: true\n";
        assert!(parse_config_str(yaml).is_err());
    }

    #[test]
    fn test_invalid_enum_rejected() {
        let yaml = "policy:\n  on_publish_failure: retry_forever\n";
        let err = format!("{:#}", parse_config_str(yaml).unwrap_err());
        assert!(err.contains("unknown variant"), "got: {err}");
    }

    #[test]
    fn test_parse_config_file_not_found() {
        let err = parse_config(Path::new("/nonexistent/forwarder.yaml"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("Failed to read forwarder config"));
    }

    #[test]
    fn test_load_config_without_file_uses_overrides() {
        let overrides = ConfigOverrides {
            log_file: Some("/var/log/app.log".into()),
            topic: Some("app".into()),
            ..ConfigOverrides::default()
        };
        let config = load_config(None, &overrides).unwrap();
        assert_eq!(config.forwarder, "app");
        assert_eq!(config.broker.topic, "app");
    }
}
