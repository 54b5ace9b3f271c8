//! Time source used by the scheduler and directive resolution.
//!
//! Everything time-sensitive takes its `now` from a [`Clock`] so tests can
//! drive the scheduler deterministically with a [`ManualClock`].

use chrono::{DateTime, Duration, Local, Timelike};
use std::sync::Mutex;

/// Supplies the current local time.
pub trait Clock: Send + Sync {
    /// Current wall-clock time in the local timezone.
    fn now(&self) -> DateTime<Local>;

    /// Current time formatted at minute resolution (`HH:MM`).
    fn now_hhmm(&self) -> String {
        format_hhmm(&self.now())
    }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: DateTime<Local>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Format a time as zero-padded `HH:MM`.
pub fn format_hhmm(t: &DateTime<Local>) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, h, m, s).single().unwrap()
    }

    #[test]
    fn format_pads_single_digits() {
        assert_eq!(format_hhmm(&at(7, 5, 59)), "07:05");
        assert_eq!(format_hhmm(&at(23, 0, 0)), "23:00");
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(at(6, 59, 59));
        assert_eq!(clock.now_hhmm(), "06:59");
        clock.advance(Duration::seconds(1));
        assert_eq!(clock.now_hhmm(), "07:00");
        clock.set(at(12, 30, 0));
        assert_eq!(clock.now(), at(12, 30, 0));
    }

    #[test]
    fn system_clock_is_close_to_now() {
        let before = Local::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }
}
