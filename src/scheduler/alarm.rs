//! Alarm and timer definitions.
//!
//! An [`Alarm`] is either a clock alarm (fires when the local time reads
//! `HH:MM`) or a timer (fires once an absolute instant has passed). The
//! persisted form is [`AlarmRecord`], which mirrors the backend's JSON.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{LiebeError, Result};

/// Backend-assigned alarm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmId(pub i64);

impl std::fmt::Display for AlarmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A wall-clock time of day at minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlarmTime {
    hour: u8,
    minute: u8,
}

impl AlarmTime {
    /// Create a time, rejecting out-of-range fields.
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(LiebeError::Directive(format!(
                "time out of range: {hour}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    /// The minute `t` falls in.
    pub fn of(t: &DateTime<Local>) -> Self {
        // chrono guarantees hour < 24 and minute < 60.
        Self {
            hour: t.hour() as u8,
            minute: t.minute() as u8,
        }
    }

    /// Hour of day (0-23).
    pub fn hour(&self) -> u8 {
        self.hour
    }

    /// Minute of hour (0-59).
    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// This time on `date` in the local timezone, at second zero.
    ///
    /// Returns `None` when the local time does not exist (DST gap).
    pub fn on_date(&self, date: NaiveDate) -> Option<DateTime<Local>> {
        let naive = date.and_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)?;
        Local.from_local_datetime(&naive).earliest()
    }
}

impl std::fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl std::str::FromStr for AlarmTime {
    type Err = LiebeError;

    /// Parse `H:MM` or `HH:MM`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || LiebeError::Directive(format!("invalid alarm time: {s:?}"));
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u8 = h.parse().map_err(|_| invalid())?;
        let minute: u8 = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

/// Discriminates the two alarm families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlarmKind {
    /// Fires at a time of day.
    #[serde(rename = "alarm")]
    ClockAlarm,
    /// Fires at an absolute instant.
    #[serde(rename = "timer")]
    Timer,
}

/// When an alarm fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Local time of day.
    Clock(AlarmTime),
    /// Epoch milliseconds.
    Instant(i64),
}

/// An alarm in the active set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    /// Backend identifier.
    pub id: AlarmId,
    /// Firing condition.
    pub trigger: Trigger,
    /// Short text shown in the alarm list (`"07:30"`, `"10m"`).
    pub label: String,
    /// Whether look-ahead preparation already ran.
    pub prepared: bool,
}

impl Alarm {
    /// Kind derived from the trigger.
    pub fn kind(&self) -> AlarmKind {
        match self.trigger {
            Trigger::Clock(_) => AlarmKind::ClockAlarm,
            Trigger::Instant(_) => AlarmKind::Timer,
        }
    }
}

/// An alarm not yet assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlarm {
    /// Firing condition.
    pub trigger: Trigger,
    /// Display label.
    pub label: String,
}

impl NewAlarm {
    /// A clock alarm labelled with its time.
    pub fn clock(time: AlarmTime) -> Self {
        Self {
            trigger: Trigger::Clock(time),
            label: time.to_string(),
        }
    }

    /// A timer firing at `at_ms` epoch milliseconds.
    pub fn timer(at_ms: i64, label: impl Into<String>) -> Self {
        Self {
            trigger: Trigger::Instant(at_ms),
            label: label.into(),
        }
    }

    /// Attach an id.
    pub fn with_id(self, id: AlarmId) -> Alarm {
        Alarm {
            id,
            trigger: self.trigger,
            label: self.label,
            prepared: false,
        }
    }
}

/// Backend JSON representation of an alarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRecord {
    /// Present on records read back from the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// `"alarm"` or `"timer"`.
    #[serde(rename = "type")]
    pub kind: AlarmKind,
    /// `HH:MM` for alarms, epoch milliseconds for timers.
    pub time_value: String,
    /// Optional label.
    #[serde(default)]
    pub display: Option<String>,
    /// Preparation latch.
    #[serde(default)]
    pub prepared: bool,
}

impl AlarmRecord {
    /// Record for creating `alarm` on the backend.
    pub fn from_new(alarm: &NewAlarm) -> Self {
        let (kind, time_value, display) = match alarm.trigger {
            Trigger::Clock(time) => (AlarmKind::ClockAlarm, time.to_string(), None),
            Trigger::Instant(at_ms) => (AlarmKind::Timer, at_ms.to_string(), Some(alarm.label.clone())),
        };
        Self {
            id: None,
            kind,
            time_value,
            display,
            prepared: false,
        }
    }
}

impl TryFrom<AlarmRecord> for Alarm {
    type Error = LiebeError;

    fn try_from(record: AlarmRecord) -> Result<Self> {
        let id = record
            .id
            .ok_or_else(|| LiebeError::Persistence("alarm record without id".to_owned()))?;

        let trigger = match record.kind {
            AlarmKind::ClockAlarm => Trigger::Clock(record.time_value.parse().map_err(|e: LiebeError| {
                LiebeError::Persistence(format!("alarm {id}: {}", e.message()))
            })?),
            AlarmKind::Timer => Trigger::Instant(parse_epoch_millis(&record.time_value).ok_or_else(
                || LiebeError::Persistence(format!("alarm {id}: bad timer value {:?}", record.time_value)),
            )?),
        };

        let label = record
            .display
            .filter(|display| !display.is_empty())
            .unwrap_or(record.time_value);

        Ok(Self {
            id: AlarmId(id),
            trigger,
            label,
            prepared: record.prepared,
        })
    }
}

/// Timers may come back as `"1760000000000"` or `"1760000000000.0"`.
fn parse_epoch_millis(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i64))
}
