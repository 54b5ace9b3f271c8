//! Persistence collaborator for alarms and notes.
//!
//! The backend is opaque to the rest of the crate: callers go through the
//! [`Store`] trait. [`HttpStore`] talks to the REST backend; [`MemoryStore`]
//! keeps everything in process.
//!
//! Failures are reported as [`LiebeError::Persistence`](crate::error::LiebeError::Persistence).
//! Callers log them and carry on; the next resynchronisation is the
//! recovery path.

pub mod http;
pub mod memory;

use async_trait::async_trait;

pub use http::HttpStore;
pub use memory::MemoryStore;

use crate::directive::DateKey;
use crate::error::Result;
use crate::notes::{NewNote, Note, NoteId, NoteKind};
use crate::scheduler::alarm::{Alarm, AlarmId, NewAlarm};

/// Create/list/delete access to persisted alarms and notes.
#[async_trait]
pub trait Store: Send + Sync {
    /// Every stored alarm.
    async fn list_alarms(&self) -> Result<Vec<Alarm>>;

    /// Persist a new alarm and return it with its id.
    async fn create_alarm(&self, alarm: NewAlarm) -> Result<Alarm>;

    /// Delete an alarm.
    async fn delete_alarm(&self, id: AlarmId) -> Result<()>;

    /// Notes for one day, or all notes when `date` is `None`.
    async fn list_notes(&self, date: Option<DateKey>) -> Result<Vec<Note>>;

    /// Persist a new note as-is.
    async fn create_note(&self, note: NewNote) -> Result<Note>;

    /// Delete a note.
    async fn delete_note(&self, id: NoteId) -> Result<()>;

    /// Persist a note, first deleting any briefing already filed for the
    /// same day when `note` is itself a briefing.
    async fn put_note(&self, note: NewNote) -> Result<Note> {
        if note.kind == NoteKind::Briefing {
            let existing = self.list_notes(Some(note.date_key)).await?;
            for old in existing.into_iter().filter(|n| n.kind == NoteKind::Briefing) {
                self.delete_note(old.id).await?;
            }
        }
        self.create_note(note).await
    }
}
