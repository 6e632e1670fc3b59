//! Recurrence period derived from a configured interval.

use std::fmt;
use std::time::Duration;

/// Longest supported period (one leap year).
pub const MAX_PERIOD_SECS: u64 = 366 * 24 * 60 * 60;

/// Period between two ticks.
///
/// Whole-minute intervals are kept in minutes; anything else (sub-minute or
/// fractional) is rounded to the nearest second. Both forms map to the same
/// wall-clock duration, so `1.0` minute and `60` seconds fire identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrencePeriod {
    Minutes(u64),
    Seconds(u64),
}

impl RecurrencePeriod {
    /// Returns `None` when the interval disables scheduling (zero, negative
    /// or not a finite number).
    pub fn from_minutes(interval_minutes: f64) -> Option<Self> {
        if !interval_minutes.is_finite() || interval_minutes <= 0.0 {
            return None;
        }

        if interval_minutes >= 1.0 && interval_minutes.fract() == 0.0 {
            let minutes = (interval_minutes as u64).min(MAX_PERIOD_SECS / 60);
            return Some(Self::Minutes(minutes));
        }

        let secs = (interval_minutes * 60.0)
            .round()
            .clamp(1.0, MAX_PERIOD_SECS as f64) as u64;
        Some(Self::Seconds(secs))
    }

    pub fn as_secs(&self) -> u64 {
        match *self {
            Self::Minutes(m) => m * 60,
            Self::Seconds(s) => s,
        }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.as_secs())
    }

    pub fn as_chrono(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.as_secs() as i64)
    }
}

impl fmt::Display for RecurrencePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minutes(m) => write!(f, "every {} min", m),
            Self::Seconds(s) => write!(f, "every {} s", s),
        }
    }
}
