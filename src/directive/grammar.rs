//! Bracket-tag grammar embedded in assistant replies.
//!
//! ```text
//! [ALARM:H:MM]            clock alarm, hour may be one digit
//! [TIMER:<minutes>]       countdown timer
//! [NOTE:<content>|<date>] note for a day (`today`, `now`, or a date)
//! ```
//!
//! Only text matching these shapes exactly is recognised. A bracket that
//! does not match (e.g. `[ALARM:7am]`) is ordinary text.

use once_cell::sync::Lazy;
use regex::Regex;

static ALARM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[ALARM:(\d{1,2}:\d{2})\]").expect("valid alarm regex"));
static TIMER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[TIMER:(\d+)\]").expect("valid timer regex"));
static NOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[NOTE:(.*?)\|(.*?)\]").expect("valid note regex"));

/// A recognised directive, before it is resolved against the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveMatch {
    /// `[ALARM:H:MM]` with the raw `H:MM` text.
    Alarm {
        /// Time text as written.
        time: String,
    },
    /// `[TIMER:n]`.
    Timer {
        /// Minutes as written.
        minutes: String,
    },
    /// `[NOTE:content|date]`.
    Note {
        /// Note body.
        content: String,
        /// Date token as written.
        date_keyword: String,
    },
}

/// First match of each directive kind, in alarm, timer, note order.
pub fn parse_directives(text: &str) -> Vec<DirectiveMatch> {
    let mut matches = Vec::new();

    if let Some(caps) = ALARM_RE.captures(text) {
        matches.push(DirectiveMatch::Alarm {
            time: caps[1].to_owned(),
        });
    }
    if let Some(caps) = TIMER_RE.captures(text) {
        matches.push(DirectiveMatch::Timer {
            minutes: caps[1].to_owned(),
        });
    }
    if let Some(caps) = NOTE_RE.captures(text) {
        matches.push(DirectiveMatch::Note {
            content: caps[1].to_owned(),
            date_keyword: caps[2].to_owned(),
        });
    }

    matches
}

/// Remove every recognised directive tag. Surrounding whitespace is kept.
pub fn strip_directives(text: &str) -> String {
    let text = ALARM_RE.replace_all(text, "");
    let text = TIMER_RE.replace_all(&text, "");
    let text = NOTE_RE.replace_all(&text, "");
    text.into_owned()
}

/// [`strip_directives`] for a reply that is still arriving.
///
/// A trailing `[` with no closing `]` yet may be the start of a tag, so it
/// and everything after it are held back.
pub fn strip_partial_directives(text: &str) -> String {
    let mut text = strip_directives(text);
    if let Some(open) = text.rfind('[')
        && !text[open..].contains(']')
    {
        text.truncate(open);
    }
    text
}
