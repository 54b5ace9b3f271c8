//! In-process [`Store`] implementation.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::Store;
use crate::directive::DateKey;
use crate::error::{LiebeError, Result};
use crate::notes::{NewNote, Note, NoteBook, NoteId};
use crate::scheduler::alarm::{Alarm, AlarmId, NewAlarm};

#[derive(Debug, Default)]
struct MemoryState {
    alarms: Vec<Alarm>,
    next_alarm_id: i64,
    notes: NoteBook,
    next_note_id: i64,
    offline: bool,
}

impl MemoryState {
    fn check_online(&self) -> Result<()> {
        if self.offline {
            return Err(LiebeError::Persistence("store offline".to_owned()));
        }
        Ok(())
    }
}

/// A store that keeps alarms and notes in memory.
///
/// Can be switched offline to exercise persistence-failure handling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail (or succeed again).
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_alarms(&self) -> Result<Vec<Alarm>> {
        let state = self.state.lock().await;
        state.check_online()?;
        Ok(state.alarms.clone())
    }

    async fn create_alarm(&self, alarm: NewAlarm) -> Result<Alarm> {
        let mut state = self.state.lock().await;
        state.check_online()?;
        state.next_alarm_id += 1;
        let alarm = alarm.with_id(AlarmId(state.next_alarm_id));
        state.alarms.push(alarm.clone());
        Ok(alarm)
    }

    async fn delete_alarm(&self, id: AlarmId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_online()?;
        let pos = state
            .alarms
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| LiebeError::Persistence(format!("alarm {id} not found")))?;
        state.alarms.remove(pos);
        Ok(())
    }

    async fn list_notes(&self, date: Option<DateKey>) -> Result<Vec<Note>> {
        let state = self.state.lock().await;
        state.check_online()?;
        Ok(match date {
            Some(key) => state.notes.for_day(key).to_vec(),
            None => state.notes.iter().cloned().collect(),
        })
    }

    async fn create_note(&self, note: NewNote) -> Result<Note> {
        let mut state = self.state.lock().await;
        state.check_online()?;
        state.next_note_id += 1;
        let note = note.with_id(NoteId(state.next_note_id));
        state.notes.insert(note.clone());
        Ok(note)
    }

    async fn delete_note(&self, id: NoteId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_online()?;
        state
            .notes
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| LiebeError::Persistence(format!("note {id} not found")))
    }
}
