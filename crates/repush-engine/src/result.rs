//! Pass result types.

use repush_types::checkpoint::Checkpoint;
use repush_types::state::ForwarderId;

/// Per-line tallies for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassCounts {
    /// Lines taken from the source after the checkpoint.
    pub lines_read: u64,
    pub delivered: u64,
    pub publish_failures: u64,
    pub malformed: u64,
}

impl PassCounts {
    /// Records written to the failure sink.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.publish_failures + self.malformed
    }
}

/// Result of a completed pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub forwarder: ForwarderId,
    /// Checkpoint loaded at the start of the pass.
    pub previous: Checkpoint,
    /// Checkpoint saved at the end of the pass.
    pub checkpoint: Checkpoint,
    pub counts: PassCounts,
    /// The checkpoint pointed past the end of the file.
    pub truncation_detected: bool,
    /// The pass stopped at a failed line under the `hold` policy.
    pub held: bool,
    pub duration_secs: f64,
}

impl PassReport {
    /// Whether any line was taken from the source.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.counts.lines_read == 0
    }
}

/// One line of `repush check` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckItem {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl CheckItem {
    #[must_use]
    pub fn ok(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok: true,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn failed(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Result of checking a forwarder's resources.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub items: Vec<CheckItem>,
}

impl CheckReport {
    pub fn push(&mut self, item: CheckItem) {
        self.items.push(item);
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.items.iter().all(|item| item.ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_sums_both_kinds() {
        let counts = PassCounts {
            lines_read: 10,
            delivered: 7,
            publish_failures: 2,
            malformed: 1,
        };
        assert_eq!(counts.failed(), 3);
    }

    #[test]
    fn check_report_fails_on_any_item() {
        let mut report = CheckReport::default();
        report.push(CheckItem::ok("Log file", "12 bytes"));
        assert!(report.is_ok());
        report.push(CheckItem::failed("Broker", "connection refused"));
        assert!(!report.is_ok());
    }
}
