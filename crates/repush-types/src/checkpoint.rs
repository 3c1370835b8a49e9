//! Line-ordinal progress marker.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal of the last log line fully processed by a previous pass.
///
/// Lines are numbered from 1; [`Checkpoint::ZERO`] means nothing has been
/// processed yet and every complete line in the file is new.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Checkpoint(u64);

impl Checkpoint {
    /// Start of file.
    pub const ZERO: Self = Self(0);

    /// Checkpoint positioned after line `line`.
    #[must_use]
    pub const fn at(line: u64) -> Self {
        Self(line)
    }

    /// Ordinal of the last processed line.
    #[must_use]
    pub const fn line(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Whether a line at `position` lies after this checkpoint.
    #[must_use]
    pub const fn covers(self, position: u64) -> bool {
        position <= self.0
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.0)
    }
}

impl From<u64> for Checkpoint {
    fn from(line: u64) -> Self {
        Self(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_default() {
        assert_eq!(Checkpoint::default(), Checkpoint::ZERO);
        assert!(Checkpoint::ZERO.is_zero());
    }

    #[test]
    fn covers_is_inclusive() {
        let cp = Checkpoint::at(3);
        assert!(cp.covers(1));
        assert!(cp.covers(3));
        assert!(!cp.covers(4));
        assert!(!Checkpoint::ZERO.covers(1));
    }

    #[test]
    fn ordering_follows_line() {
        assert!(Checkpoint::at(2) < Checkpoint::at(10));
        assert_eq!(Checkpoint::from(7).line(), 7);
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&Checkpoint::at(42)).unwrap();
        assert_eq!(json, "42");
    }
}
