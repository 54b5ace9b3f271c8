//! Directive extraction from finalized assistant replies.
//!
//! The assistant can ask the client to set alarms, start timers and file
//! notes by embedding bracket tags in its reply (see [`grammar`]).
//! [`extract`] is pure: given the reply and the current time it returns the
//! display text with tags removed and the side-effect requests to execute.
//! It performs no I/O.
//!
//! # Examples
//!
//! ```
//! use chrono::Local;
//! use liebe::directive::{extract, DirectiveRequest};
//!
//! let out = extract("Sure! [TIMER:10]", &Local::now());
//! assert_eq!(out.cleaned_text, "Sure! ");
//! assert!(matches!(out.requests[0], DirectiveRequest::CreateTimer { minutes: 10, .. }));
//! ```

pub mod date;
pub mod grammar;

use chrono::{DateTime, Local};
use tracing::debug;

pub use date::{DateKey, parse_date_token};
pub use grammar::{DirectiveMatch, parse_directives, strip_directives, strip_partial_directives};

use crate::error::LiebeError;
use crate::scheduler::alarm::AlarmTime;

/// Milliseconds per timer minute.
const MINUTE_MS: i64 = 60_000;

/// A side effect requested by the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveRequest {
    /// Create a clock alarm.
    CreateAlarm {
        /// Zero-padded time of day.
        time: AlarmTime,
    },
    /// Create a countdown timer.
    CreateTimer {
        /// Requested duration.
        minutes: u32,
        /// Epoch milliseconds at which it fires.
        fire_at_ms: i64,
        /// Display label (`"10m"`).
        label: String,
    },
    /// File a note under a day.
    CreateNote {
        /// Note body.
        content: String,
        /// Day the note belongs to.
        date_key: DateKey,
    },
}

/// Result of [`extract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Reply text with every recognised tag removed, otherwise unchanged.
    pub cleaned_text: String,
    /// Requests to execute, in alarm, timer, note order.
    pub requests: Vec<DirectiveRequest>,
}

/// Extract directives from `text`, resolving relative values against `now`.
pub fn extract(text: &str, now: &DateTime<Local>) -> Extraction {
    let requests = parse_directives(text)
        .into_iter()
        .filter_map(|m| match resolve(m, now) {
            Ok(request) => Some(request),
            Err(e) => {
                debug!(error = %e, "dropping directive");
                None
            }
        })
        .collect();

    Extraction {
        cleaned_text: strip_directives(text),
        requests,
    }
}

/// Turn a parsed match into a concrete request.
pub fn resolve(m: DirectiveMatch, now: &DateTime<Local>) -> Result<DirectiveRequest, LiebeError> {
    match m {
        DirectiveMatch::Alarm { time } => Ok(DirectiveRequest::CreateAlarm {
            time: time.parse()?,
        }),
        DirectiveMatch::Timer { minutes } => {
            let minutes: u32 = minutes
                .parse()
                .map_err(|_| LiebeError::Directive(format!("timer minutes out of range: {minutes}")))?;
            Ok(DirectiveRequest::CreateTimer {
                minutes,
                fire_at_ms: now.timestamp_millis() + i64::from(minutes) * MINUTE_MS,
                label: format!("{minutes}m"),
            })
        }
        DirectiveMatch::Note {
            content,
            date_keyword,
        } => {
            let date_key = parse_date_token(&date_keyword, now).ok_or_else(|| {
                LiebeError::Directive(format!("unparseable note date: {date_keyword:?}"))
            })?;
            Ok(DirectiveRequest::CreateNote { content, date_key })
        }
    }
}
