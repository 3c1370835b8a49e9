//! Log lines and the outcome of offering one to the broker.

use std::fmt;

/// One newline-delimited unit of the log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 1-based ordinal within the file.
    pub position: u64,
    /// Line content without the trailing newline.
    pub text: String,
}

impl Line {
    #[must_use]
    pub fn new(position: u64, text: impl Into<String>) -> Self {
        Self {
            position,
            text: text.into(),
        }
    }

    /// Payload handed to the publisher.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

/// Result of offering one line to the publish capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered,
    Failed(String),
}

impl PublishOutcome {
    /// Shorthand for a failure with a formatted reason.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered => f.write_str("delivered"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_text_bytes() {
        let line = Line::new(1, "hello");
        assert_eq!(line.payload(), b"hello");
    }

    #[test]
    fn outcome_display() {
        assert_eq!(PublishOutcome::Delivered.to_string(), "delivered");
        assert_eq!(
            PublishOutcome::failed("broker down").to_string(),
            "failed: broker down"
        );
        assert!(!PublishOutcome::failed("x").is_delivered());
    }
}
