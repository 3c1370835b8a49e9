//! Run driver: one-shot and scheduled execution of passes.
//!
//! Passes never overlap. A shutdown request is observed between passes; a
//! pass in flight always runs to completion or abort first.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::errors::PassError;
use crate::orchestrator::ForwardEngine;
use crate::publish::Publisher;
use crate::result::PassReport;
use crate::schedule::Schedule;

/// Upper bound on ticks skipped in one catch-up step.
const MAX_SKIPPED_TICKS: u64 = 10_000;

/// Tallies for a scheduled run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverSummary {
    pub passes: u64,
    pub failed_passes: u64,
    /// Ticks that fell due while a pass was still running.
    pub skipped_ticks: u64,
}

/// Run a single pass, then release the publisher.
///
/// # Errors
///
/// Returns the pass's fatal error, if any. Publisher close errors are
/// logged only.
pub async fn run_one_shot<P: Publisher>(
    engine: &mut ForwardEngine<P>,
) -> Result<PassReport, PassError> {
    let result = engine.run_once().await;
    close_publisher(engine).await;
    result
}

/// Run a pass on every tick of `schedule` until `shutdown` becomes `true`
/// or its sender is dropped.
///
/// A fatal pass error is logged and the loop waits for the next tick.
pub async fn run_scheduled<P: Publisher>(
    engine: &mut ForwardEngine<P>,
    schedule: &Schedule,
    mut shutdown: watch::Receiver<bool>,
) -> DriverSummary {
    let mut summary = DriverSummary::default();
    let mut anchor = Utc::now();

    tracing::info!(
        forwarder = %engine.settings().forwarder,
        schedule = %schedule,
        "Scheduled run started"
    );

    loop {
        if *shutdown.borrow() {
            break;
        }
        let Some(tick) = schedule.next_after(anchor) else {
            tracing::info!(schedule = %schedule, "Schedule has no further ticks");
            break;
        };
        tracing::debug!(next_tick = %tick, "Waiting for next tick");

        tokio::select! {
            () = tokio::time::sleep(until(tick)) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        summary.passes += 1;
        match engine.run_once().await {
            Ok(report) => {
                if report.held {
                    tracing::warn!(
                        forwarder = %report.forwarder,
                        checkpoint = report.checkpoint.line(),
                        "Pass held at a failed line, it will be retried next tick"
                    );
                }
            }
            Err(err) => {
                summary.failed_passes += 1;
                tracing::error!(
                    forwarder = %engine.settings().forwarder,
                    resource = err.resource(),
                    phase = %err.phase(),
                    error = %err,
                    "Pass failed, waiting for next tick"
                );
            }
        }

        let (next_anchor, skipped) = skip_missed(schedule, tick, Utc::now());
        if skipped > 0 {
            tracing::warn!(skipped, "Pass overran the schedule, skipping missed ticks");
        }
        summary.skipped_ticks += skipped;
        anchor = next_anchor;
    }

    tracing::info!(
        passes = summary.passes,
        failed_passes = summary.failed_passes,
        skipped_ticks = summary.skipped_ticks,
        "Scheduled run stopped"
    );
    close_publisher(engine).await;
    summary
}

async fn close_publisher<P: Publisher>(engine: &mut ForwardEngine<P>) {
    if let Err(e) = engine.close_publisher().await {
        tracing::warn!(error = %e, "Failed to close publisher");
    }
}

fn until(tick: DateTime<Utc>) -> Duration {
    (tick - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

/// Advance past every tick at or before `now`, starting from the tick that
/// just ran. Returns the new anchor and how many ticks were passed over.
fn skip_missed(
    schedule: &Schedule,
    ran: DateTime<Utc>,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, u64) {
    let mut anchor = ran;
    let mut skipped = 0;
    while let Some(next) = schedule.next_after(anchor) {
        if next > now {
            break;
        }
        if skipped == MAX_SKIPPED_TICKS {
            return (now, skipped);
        }
        anchor = next;
        skipped += 1;
    }
    (anchor, skipped)
}
