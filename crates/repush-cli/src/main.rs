mod commands;
mod logging;

use clap::{Parser, Subcommand};

use commands::ForwarderArgs;

#[derive(Parser)]
#[command(
    name = "repush",
    version,
    about = "Forward new log lines to Kafka, checkpointing progress"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Forward lines appended since the last checkpoint, then exit
    Run {
        #[command(flatten)]
        forwarder: ForwarderArgs,
    },
    /// Forward new lines on every tick of a schedule until interrupted
    Schedule {
        #[command(flatten)]
        forwarder: ForwarderArgs,
        /// Schedule expression: `@every 30s`, `@hourly`, or cron fields
        #[arg(long, alias = "cron-format")]
        cron: Option<String>,
    },
    /// Validate configuration and check the log file, checkpoint, and broker
    Check {
        #[command(flatten)]
        forwarder: ForwarderArgs,
    },
    /// Summarize records in the failure file
    Failures {
        #[command(flatten)]
        forwarder: ForwarderArgs,
        /// Number of most recent records to list
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Print matching records as JSON Lines instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run { forwarder } => commands::run::execute(&forwarder).await,
        Commands::Schedule { forwarder, cron } => {
            commands::schedule::execute(&forwarder, cron).await
        }
        Commands::Check { forwarder } => commands::check::execute(&forwarder).await,
        Commands::Failures {
            forwarder,
            limit,
            json,
        } => commands::failures::execute(&forwarder, limit, json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn run_accepts_legacy_flag_names() {
        let cli = Cli::try_parse_from([
            "repush",
            "run",
            "--log-name",
            "/var/log/app.log",
            "--last-line-name",
            "/var/lib/repush/app.checkpoint",
            "--fail-name",
            "/var/lib/repush/app.failed.jsonl",
            "--broker",
            "kafka-1:9092 kafka-2:9092",
            "--topic",
            "app",
        ])
        .unwrap();
        let Commands::Run { forwarder } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(forwarder.log_file, Some(PathBuf::from("/var/log/app.log")));
        assert_eq!(
            forwarder.checkpoint,
            Some(PathBuf::from("/var/lib/repush/app.checkpoint"))
        );
        assert_eq!(forwarder.broker.as_deref(), Some("kafka-1:9092 kafka-2:9092"));
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn schedule_takes_cron_and_global_log_level() {
        let cli = Cli::try_parse_from([
            "repush",
            "schedule",
            "--config",
            "forwarder.yaml",
            "--cron",
            "*/5 * * * *",
            "--log-level",
            "debug",
        ])
        .unwrap();
        let Commands::Schedule { forwarder, cron } = cli.command else {
            panic!("expected schedule");
        };
        assert_eq!(forwarder.config, Some(PathBuf::from("forwarder.yaml")));
        assert_eq!(cron.as_deref(), Some("*/5 * * * *"));
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn failures_defaults() {
        let cli = Cli::try_parse_from(["repush", "failures", "--failure-file", "f.jsonl"]).unwrap();
        let Commands::Failures { limit, json, .. } = cli.command else {
            panic!("expected failures");
        };
        assert_eq!(limit, 20);
        assert!(!json);
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["repush", "replay"]).is_err());
    }
}
