//! Alarm and timer scheduler.
//!
//! [`AlarmScheduler`] owns the active set and is evaluated by discrete
//! [`AlarmScheduler::tick`] calls; it has no thread of its own. The
//! [`runner::SchedulerRunner`] drives it from a periodic tokio task.
//!
//! Per-alarm state machine:
//!
//! ```text
//! clock alarm:  Armed(unprepared) → Armed(prepared) → Fired
//! timer:        Armed → Fired
//! ```
//!
//! `Fired` is terminal: the alarm leaves the active set in the same tick
//! that reports it, so it can never fire twice.

pub mod alarm;
pub mod runner;

use chrono::{DateTime, Duration, Local};
use tracing::{debug, info};

pub use alarm::{Alarm, AlarmId, AlarmKind, AlarmTime, NewAlarm, Trigger};
pub use runner::SchedulerRunner;

/// Default look-ahead for clock-alarm preparation.
pub const DEFAULT_PREPARE_WINDOW_SECS: i64 = 300;

/// Work produced by a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerRequest {
    /// A clock alarm is within the look-ahead window.
    Prepare {
        /// The alarm, with `prepared` already set.
        alarm: Alarm,
    },
    /// An alarm fired and was removed from the active set.
    Fire {
        /// The alarm as it was when it fired.
        alarm: Alarm,
    },
}

/// The active alarm set and its evaluation rules.
#[derive(Debug, Clone)]
pub struct AlarmScheduler {
    active: Vec<Alarm>,
    prepare_window: Duration,
}

impl Default for AlarmScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmScheduler {
    /// Empty scheduler with the default five-minute look-ahead.
    pub fn new() -> Self {
        Self {
            active: Vec::new(),
            prepare_window: Duration::seconds(DEFAULT_PREPARE_WINDOW_SECS),
        }
    }

    /// Override the preparation look-ahead.
    pub fn with_prepare_window(mut self, window: Duration) -> Self {
        self.prepare_window = window;
        self
    }

    /// Add an alarm, replacing one with the same id in place.
    pub fn add(&mut self, alarm: Alarm) {
        if let Some(existing) = self.active.iter_mut().find(|a| a.id == alarm.id) {
            *existing = alarm;
        } else {
            self.active.push(alarm);
        }
    }

    /// Remove an alarm by id.
    pub fn remove(&mut self, id: AlarmId) -> Option<Alarm> {
        let pos = self.active.iter().position(|a| a.id == id)?;
        Some(self.active.remove(pos))
    }

    /// Replace the active set with a fresh listing from the store.
    ///
    /// Alarms already prepared locally stay prepared. Returns the alarms
    /// that were active before but are missing from the listing.
    pub fn replace_all(&mut self, alarms: Vec<Alarm>) -> Vec<Alarm> {
        let previous = std::mem::take(&mut self.active);
        self.active = alarms
            .into_iter()
            .map(|mut alarm| {
                if previous.iter().any(|p| p.id == alarm.id && p.prepared) {
                    alarm.prepared = true;
                }
                alarm
            })
            .collect();
        debug!(count = self.active.len(), "alarm set resynchronised");
        previous
            .into_iter()
            .filter(|p| !self.active.iter().any(|a| a.id == p.id))
            .collect()
    }

    /// Active alarms in insertion order.
    pub fn alarms(&self) -> &[Alarm] {
        &self.active
    }

    /// Whether nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Evaluate every active alarm once against `now`.
    ///
    /// Requests are reported in active-set order; for a single alarm a
    /// `Prepare` precedes its `Fire`.
    pub fn tick(&mut self, now: DateTime<Local>) -> Vec<SchedulerRequest> {
        let current_minute = AlarmTime::of(&now);
        let now_ms = now.timestamp_millis();
        let mut requests = Vec::new();

        let mut kept = Vec::with_capacity(self.active.len());
        for mut alarm in std::mem::take(&mut self.active) {
            let fires = match alarm.trigger {
                Trigger::Clock(time) => {
                    if !alarm.prepared && self.within_prepare_window(time, &now) {
                        alarm.prepared = true;
                        debug!(id = %alarm.id, at = %time, "alarm entering preparation window");
                        requests.push(SchedulerRequest::Prepare {
                            alarm: alarm.clone(),
                        });
                    }
                    time == current_minute
                }
                Trigger::Instant(at_ms) => now_ms >= at_ms,
            };

            if fires {
                info!(id = %alarm.id, label = %alarm.label, "alarm fired");
                requests.push(SchedulerRequest::Fire { alarm });
            } else {
                kept.push(alarm);
            }
        }
        self.active = kept;

        requests
    }

    fn within_prepare_window(&self, time: AlarmTime, now: &DateTime<Local>) -> bool {
        let Some(scheduled) = time.on_date(now.date_naive()) else {
            return false;
        };
        let lead = scheduled - *now;
        lead > Duration::zero() && lead <= self.prepare_window
    }
}
