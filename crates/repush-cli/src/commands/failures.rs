use std::collections::BTreeMap;

use anyhow::Result;

use repush_engine::sink::{read_failure_records, FailureLog};
use repush_types::failure::FailureRecord;

use super::ForwarderArgs;

/// Execute the `failures` command: summarize the failure file and list
/// its most recent records.
pub fn execute(args: &ForwarderArgs, limit: usize, json: bool) -> Result<()> {
    let config = args.load(None)?;
    let path = &config.failures.path;
    if path.as_os_str().is_empty() {
        anyhow::bail!("No failure file configured: pass --failure-file or set failures.path");
    }
    let log = read_failure_records(path)?;

    if json {
        for record in recent(&log, limit) {
            println!("{}", serde_json::to_string(record)?);
        }
        return Ok(());
    }

    println!("Failure file: {}", path.display());
    let summary = summarize(&log);
    println!("  Records:         {}", summary.total);
    for (kind, count) in &summary.by_kind {
        println!("    {kind:13}  {count}");
    }
    if log.unreadable > 0 {
        println!("  Unreadable:      {}", log.unreadable);
    }
    if let (Some(first), Some(last)) = (&summary.first, &summary.last) {
        println!("  First failure:   {first}");
        println!("  Last failure:    {last}");
    }

    let shown = recent(&log, limit);
    if !shown.is_empty() {
        println!("\nMost recent {}:", shown.len());
        for record in shown {
            println!(
                "  line {:>8}  {:9}  {}",
                record.position, record.kind.as_str(), record.reason
            );
            println!("    {}", preview(&record.line));
        }
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    total: usize,
    by_kind: BTreeMap<&'static str, usize>,
    first: Option<String>,
    last: Option<String>,
}

fn summarize(log: &FailureLog) -> Summary {
    let mut summary = Summary {
        total: log.records.len(),
        ..Summary::default()
    };
    for record in &log.records {
        *summary.by_kind.entry(record.kind.as_str()).or_default() += 1;
    }
    summary.first = log.records.first().map(|r| r.failed_at.to_string());
    summary.last = log.records.last().map(|r| r.failed_at.to_string());
    summary
}

fn recent(log: &FailureLog, limit: usize) -> &[FailureRecord] {
    let start = log.records.len().saturating_sub(limit);
    &log.records[start..]
}

fn preview(line: &str) -> String {
    const MAX_CHARS: usize = 120;
    if line.chars().count() <= MAX_CHARS {
        line.to_string()
    } else {
        let cut: String = line.chars().take(MAX_CHARS).collect();
        format!("{cut}...")
    }
}
