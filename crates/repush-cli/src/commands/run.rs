use anyhow::Result;

use repush_engine::driver;
use repush_engine::PassReport;

use super::{build_engine, ForwarderArgs};

/// Execute the `run` command: one pass, then exit.
pub async fn execute(args: &ForwarderArgs) -> Result<()> {
    let config = args.load_validated(None)?;
    let mut engine = build_engine(&config)?;

    let report = match driver::run_one_shot(&mut engine).await {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(
                forwarder = config.forwarder,
                resource = err.resource(),
                phase = %err.phase(),
                error = %err,
                "Pass aborted"
            );
            return Err(err.into());
        }
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &PassReport) {
    if report.is_idle() {
        println!(
            "Forwarder '{}': no new lines (checkpoint {}).",
            report.forwarder,
            report.checkpoint.line()
        );
        return;
    }
    println!("Forwarder '{}' pass complete.", report.forwarder);
    println!("  Lines read:      {}", report.counts.lines_read);
    println!("  Delivered:       {}", report.counts.delivered);
    println!("  Publish failed:  {}", report.counts.publish_failures);
    println!("  Malformed:       {}", report.counts.malformed);
    println!(
        "  Checkpoint:      {} -> {}",
        report.previous.line(),
        report.checkpoint.line()
    );
    if report.truncation_detected {
        println!("  Truncation:      detected");
    }
    if report.held {
        println!("  Held:            stopped at first failed line");
    }
    println!("  Duration:        {:.2}s", report.duration_secs);
}
