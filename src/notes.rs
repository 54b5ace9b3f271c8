//! Daily notes.
//!
//! Notes are grouped by [`DateKey`]. Regular notes accumulate freely; a day
//! holds at most one briefing note, and a newer briefing replaces the older.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::directive::DateKey;
use crate::error::{LiebeError, Result};

/// Backend-assigned note identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub i64);

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a note is for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    /// Written by the user or filed from a directive.
    #[default]
    Regular,
    /// Saved morning briefing script.
    Briefing,
}

/// A stored note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Backend identifier.
    pub id: NoteId,
    /// Day the note belongs to.
    #[serde(rename = "date_str")]
    pub date_key: DateKey,
    /// Note body.
    pub content: String,
    /// Creation time, epoch seconds.
    #[serde(default)]
    pub timestamp: f64,
    /// Regular or briefing.
    #[serde(rename = "type", default)]
    pub kind: NoteKind,
}

/// Backend JSON representation of a note, before its day is parsed.
///
/// Older clients filed notes under whatever date text they were given, so
/// `date_str` is not always a readable day.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NoteRecord {
    /// Backend identifier.
    pub id: NoteId,
    /// Day text as stored.
    pub date_str: String,
    /// Note body.
    pub content: String,
    /// Creation time, epoch seconds.
    #[serde(default)]
    pub timestamp: f64,
    /// Regular or briefing.
    #[serde(rename = "type", default)]
    pub kind: NoteKind,
}

impl TryFrom<NoteRecord> for Note {
    type Error = LiebeError;

    fn try_from(record: NoteRecord) -> Result<Self> {
        let date_key = DateKey::parse(&record.date_str).ok_or_else(|| {
            LiebeError::Persistence(format!("note {}: unrecognised date {:?}", record.id, record.date_str))
        })?;
        Ok(Self {
            id: record.id,
            date_key,
            content: record.content,
            timestamp: record.timestamp,
            kind: record.kind,
        })
    }
}

/// A note not yet stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNote {
    /// Day the note belongs to.
    #[serde(rename = "date_str")]
    pub date_key: DateKey,
    /// Note body.
    pub content: String,
    /// Creation time, epoch seconds.
    pub timestamp: f64,
    /// Regular or briefing.
    #[serde(rename = "type")]
    pub kind: NoteKind,
}

impl NewNote {
    /// A regular note.
    pub fn regular(date_key: DateKey, content: impl Into<String>, timestamp: f64) -> Self {
        Self {
            date_key,
            content: content.into(),
            timestamp,
            kind: NoteKind::Regular,
        }
    }

    /// A briefing note.
    pub fn briefing(date_key: DateKey, content: impl Into<String>, timestamp: f64) -> Self {
        Self {
            date_key,
            content: content.into(),
            timestamp,
            kind: NoteKind::Briefing,
        }
    }

    /// Attach an id.
    pub fn with_id(self, id: NoteId) -> Note {
        Note {
            id,
            date_key: self.date_key,
            content: self.content,
            timestamp: self.timestamp,
            kind: self.kind,
        }
    }
}

/// Notes grouped by day.
#[derive(Debug, Clone, Default)]
pub struct NoteBook {
    by_day: BTreeMap<DateKey, Vec<Note>>,
}

impl NoteBook {
    /// Empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a note. A briefing replaces the day's existing briefing,
    /// which is returned.
    pub fn insert(&mut self, note: Note) -> Option<Note> {
        let day = self.by_day.entry(note.date_key).or_default();
        if note.kind == NoteKind::Briefing
            && let Some(existing) = day.iter_mut().find(|n| n.kind == NoteKind::Briefing)
        {
            return Some(std::mem::replace(existing, note));
        }
        day.push(note);
        None
    }

    /// Remove a note by id.
    pub fn remove(&mut self, id: NoteId) -> Option<Note> {
        let mut removed = None;
        for notes in self.by_day.values_mut() {
            if let Some(pos) = notes.iter().position(|n| n.id == id) {
                removed = Some(notes.remove(pos));
                break;
            }
        }
        self.by_day.retain(|_, notes| !notes.is_empty());
        removed
    }

    /// Notes for one day, in insertion order.
    pub fn for_day(&self, key: DateKey) -> &[Note] {
        self.by_day.get(&key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every note, oldest day first.
    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.by_day.values().flatten()
    }

    /// Days that have at least one note.
    pub fn days(&self) -> impl Iterator<Item = DateKey> + '_ {
        self.by_day.keys().copied()
    }

    /// Total number of notes.
    pub fn len(&self) -> usize {
        self.by_day.values().map(Vec::len).sum()
    }

    /// Whether the book is empty.
    pub fn is_empty(&self) -> bool {
        self.by_day.is_empty()
    }
}
