//! [`Store`] backed by the assistant backend's REST endpoints.
//!
//! ```text
//! GET    /api/alarms            → [AlarmRecord]
//! POST   /api/alarms            ← AlarmRecord   → AlarmRecord
//! DELETE /api/alarms/<id>
//! GET    /api/notes[?date=key]  → [NoteRecord]
//! POST   /api/notes             ← NewNote       → NoteRecord
//! DELETE /api/notes/<id>
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::Store;
use crate::config::ServerConfig;
use crate::directive::DateKey;
use crate::error::{LiebeError, Result};
use crate::notes::{NewNote, Note, NoteId, NoteRecord};
use crate::scheduler::alarm::{Alarm, AlarmId, AlarmRecord, NewAlarm};

/// REST-backed store.
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpStore {
    /// Create a store for the backend at `config.base_url`.
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| LiebeError::Persistence(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| LiebeError::Persistence(format!("invalid response body: {e}")))
    }
}

/// Map a non-success status to a persistence error.
fn map_http_error(status: reqwest::StatusCode, body: &str) -> LiebeError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_owned());
    LiebeError::Persistence(format!("HTTP {}: {message}", status.as_u16()))
}

#[async_trait]
impl Store for HttpStore {
    async fn list_alarms(&self) -> Result<Vec<Alarm>> {
        let records: Vec<AlarmRecord> = self.json(self.client.get(self.url("/api/alarms"))).await?;

        let mut alarms = Vec::with_capacity(records.len());
        for record in records {
            match Alarm::try_from(record) {
                Ok(alarm) => alarms.push(alarm),
                Err(e) => debug!(error = %e, "skipping unreadable alarm record"),
            }
        }
        Ok(alarms)
    }

    async fn create_alarm(&self, alarm: NewAlarm) -> Result<Alarm> {
        let body = AlarmRecord::from_new(&alarm);
        let created: AlarmRecord = self
            .json(self.client.post(self.url("/api/alarms")).json(&body))
            .await?;
        Alarm::try_from(created)
    }

    async fn delete_alarm(&self, id: AlarmId) -> Result<()> {
        self.send(self.client.delete(self.url(&format!("/api/alarms/{id}"))))
            .await
            .map(|_| ())
    }

    async fn list_notes(&self, date: Option<DateKey>) -> Result<Vec<Note>> {
        let mut request = self.client.get(self.url("/api/notes"));
        if let Some(key) = date {
            request = request.query(&[("date", key.to_string())]);
        }
        let records: Vec<NoteRecord> = self.json(request).await?;

        let mut notes = Vec::with_capacity(records.len());
        for record in records {
            match Note::try_from(record) {
                Ok(note) => notes.push(note),
                Err(e) => debug!(error = %e, "skipping unreadable note record"),
            }
        }
        Ok(notes)
    }

    async fn create_note(&self, note: NewNote) -> Result<Note> {
        let created: NoteRecord = self
            .json(self.client.post(self.url("/api/notes")).json(&note))
            .await?;
        Note::try_from(created)
    }

    async fn delete_note(&self, id: NoteId) -> Result<()> {
        self.send(self.client.delete(self.url(&format!("/api/notes/{id}"))))
            .await
            .map(|_| ())
    }
}
