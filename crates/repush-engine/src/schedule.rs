//! Schedule expressions for the scheduled run mode.
//!
//! Supported formats:
//! - `@every <N><unit>` where unit is `s`, `m`, `h`, `d`
//! - `@hourly`, `@daily`, `@weekly`, `@monthly`, `@yearly`
//! - 5-field cron (`min hour dom month dow`), run at second 0
//! - 6/7-field cron with a leading seconds field (and optional year)

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid schedule expression '{expr}': {reason}")]
    Invalid { expr: String, reason: String },
}

impl ScheduleError {
    fn invalid(expr: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}

/// When passes run in scheduled mode.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Fixed interval measured from the previous tick.
    Every(Duration),
    /// Calendar schedule.
    Cron(cron::Schedule),
}

impl Schedule {
    /// Parse a schedule expression.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Invalid`] if the expression is not understood.
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(ScheduleError::invalid(expr, "empty expression"));
        }

        if let Some(rest) = expr
            .strip_prefix("@every ")
            .or_else(|| expr.strip_prefix("@every\t"))
        {
            return parse_every(expr, rest.trim()).map(Self::Every);
        }

        let normalized = if expr.starts_with('@') {
            expr.to_ascii_lowercase()
        } else {
            match expr.split_whitespace().count() {
                5 => format!("0 {expr}"),
                6 | 7 => expr.to_string(),
                n => {
                    return Err(ScheduleError::invalid(
                        expr,
                        format!("expected 5, 6 or 7 fields, found {n}"),
                    ))
                }
            }
        };

        cron::Schedule::from_str(&normalized)
            .map(Self::Cron)
            .map_err(|e| ScheduleError::invalid(expr, e.to_string()))
    }

    /// The first tick strictly after `now`, or `None` if the schedule has
    /// no further occurrences.
    #[must_use]
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Every(interval) => chrono::Duration::from_std(*interval)
                .ok()
                .and_then(|d| now.checked_add_signed(d)),
            Self::Cron(schedule) => schedule.after(&now).next(),
        }
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Every(interval) => write!(f, "every {}s", interval.as_secs_f64()),
            Self::Cron(schedule) => write!(f, "cron '{schedule}'"),
        }
    }
}

fn parse_every(expr: &str, rest: &str) -> Result<Duration, ScheduleError> {
    let Some((split, unit)) = rest.char_indices().last() else {
        return Err(ScheduleError::invalid(expr, "expected <N><s|m|h|d>"));
    };
    let num_str = &rest[..split];
    if num_str.is_empty() {
        return Err(ScheduleError::invalid(expr, "expected <N><s|m|h|d>"));
    }
    let num: u64 = num_str
        .parse()
        .map_err(|_| ScheduleError::invalid(expr, format!("invalid count '{num_str}'")))?;
    if num == 0 {
        return Err(ScheduleError::invalid(expr, "interval must be > 0"));
    }
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86_400,
        _ => return Err(ScheduleError::invalid(expr, format!("unknown unit '{unit}'"))),
    };
    let interval = num
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| ScheduleError::invalid(expr, "interval too large"))?;
    // next_after must be able to add the interval to the current time.
    chrono::Duration::from_std(interval)
        .ok()
        .and_then(|d| Utc::now().checked_add_signed(d))
        .ok_or_else(|| ScheduleError::invalid(expr, "interval too large"))?;
    Ok(interval)
}
