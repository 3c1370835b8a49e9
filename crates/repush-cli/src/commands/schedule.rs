use anyhow::{Context, Result};

use repush_engine::driver;
use repush_engine::schedule::Schedule;

use super::{build_engine, shutdown_signal, ForwarderArgs};

/// Execute the `schedule` command: run a pass on every tick until Ctrl-C
/// or SIGTERM.
pub async fn execute(args: &ForwarderArgs, cron: Option<String>) -> Result<()> {
    let config = args.load_validated(cron)?;
    let expr = config
        .schedule
        .cron
        .as_deref()
        .context("No schedule given: pass --cron or set schedule.cron")?;
    let schedule = Schedule::parse(expr)?;
    let mut engine = build_engine(&config)?;

    let summary = driver::run_scheduled(&mut engine, &schedule, shutdown_signal()).await;

    println!("Forwarder '{}' stopped.", config.forwarder);
    println!("  Passes:          {}", summary.passes);
    println!("  Failed passes:   {}", summary.failed_passes);
    if summary.skipped_ticks > 0 {
        println!("  Skipped ticks:   {}", summary.skipped_ticks);
    }
    Ok(())
}
