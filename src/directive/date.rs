//! Calendar day keys used to group notes.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::LiebeError;

/// Format of the canonical key string (`"Sat Feb 21 2026"`).
const KEY_FORMAT: &str = "%a %b %d %Y";

/// Date-only formats accepted in note directives and backend records.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    KEY_FORMAT,
    "%A %B %d %Y",
    "%A, %B %d, %Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
];

/// Date-time formats without an offset.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// A calendar day in the local timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
    /// Key for `date`.
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Key for the local day `now` falls on.
    pub fn today(now: &DateTime<Local>) -> Self {
        Self(now.date_naive())
    }

    /// The underlying date.
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Parse an absolute date written in any accepted format.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(Self(dt.with_timezone(&Local).date_naive()));
        }
        if let Some(dt) = DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        {
            return Some(Self(dt.date()));
        }
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
            .map(Self)
    }
}

impl std::fmt::Display for DateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(KEY_FORMAT))
    }
}

impl TryFrom<String> for DateKey {
    type Error = LiebeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| LiebeError::Persistence(format!("unrecognised date key {s:?}")))
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> Self {
        key.to_string()
    }
}

/// Resolve a note directive's date token.
///
/// `today` and `now` (any case) mean the day `now` falls on; anything else
/// must parse as a date. Returns `None` for unparseable tokens.
pub fn parse_date_token(token: &str, now: &DateTime<Local>) -> Option<DateKey> {
    let token = token.trim();
    if token.eq_ignore_ascii_case("today") || token.eq_ignore_ascii_case("now") {
        return Some(DateKey::today(now));
    }
    DateKey::parse(token)
}
