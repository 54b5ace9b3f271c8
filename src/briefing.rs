//! Morning briefing.
//!
//! When a clock alarm enters its preparation window the backend is asked to
//! compose a wake-up script (weather, news, today's notes). The script is
//! cached per alarm and delivered when the alarm fires, then filed as the
//! day's briefing note. If nothing was prepared, one more fetch is made at
//! fire time before falling back to [`FALLBACK_SCRIPT`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::directive::DateKey;
use crate::error::Result;
use crate::notes::NewNote;
use crate::scheduler::alarm::{Alarm, AlarmId, AlarmKind};
use crate::sink::NotificationSink;
use crate::store::Store;

/// Delivered when the backend could not produce a script.
pub const FALLBACK_SCRIPT: &str = "Hello! I couldn't reach the weather and news services right now, but I hope you have a wonderful day ahead.";

/// Body of `POST /api/morning_briefing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefingRequest {
    /// City for the weather report.
    pub city: String,
    /// Contents of today's notes.
    pub notes: Vec<String>,
}

/// Backend reply to a briefing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefingScript {
    /// Text to read out.
    pub script: String,
    /// Raw weather summary used to compose it.
    #[serde(default)]
    pub weather: String,
    /// Raw news summary used to compose it.
    #[serde(default)]
    pub news: String,
}

/// Something that can compose a briefing.
#[async_trait]
pub trait BriefingSource: Send + Sync {
    /// Compose a briefing for `request`.
    async fn fetch(&self, request: &BriefingRequest) -> Result<BriefingScript>;
}

/// Reformat a spoken script for storage as a note.
///
/// Ordinal lead-ins ("First, ", "Second, ", "Third, ") become bullets and
/// each sentence gets its own line.
pub fn format_briefing_note(script: &str) -> String {
    script
        .replace("First, ", "\n• ")
        .replace("Second, ", "\n• ")
        .replace("Third, ", "\n• ")
        .replace(". ", ".\n")
        .trim()
        .to_owned()
}

/// Prepared scripts keyed by alarm.
#[derive(Debug, Default, Clone)]
pub struct BriefingCache {
    scripts: HashMap<AlarmId, String>,
}

impl BriefingCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a script for `id`, replacing any earlier one.
    pub fn insert(&mut self, id: AlarmId, script: String) {
        self.scripts.insert(id, script);
    }

    /// Remove and return the script for `id`.
    pub fn take(&mut self, id: AlarmId) -> Option<String> {
        self.scripts.remove(&id)
    }

    /// Whether a script is waiting for `id`.
    pub fn contains(&self, id: AlarmId) -> bool {
        self.scripts.contains_key(&id)
    }

    /// Number of cached scripts.
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

/// A [`NotificationSink`] that adds briefings to clock alarms.
///
/// Every event is forwarded to the inner sink. Timers pass straight through.
pub struct BriefingCoordinator {
    inner: Arc<dyn NotificationSink>,
    source: Arc<dyn BriefingSource>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    city: String,
    enabled: bool,
    cache: Mutex<BriefingCache>,
}

impl BriefingCoordinator {
    /// Wrap `inner` with briefing preparation and delivery.
    pub fn new(
        inner: Arc<dyn NotificationSink>,
        source: Arc<dyn BriefingSource>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        city: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            source,
            store,
            clock,
            city: city.into(),
            enabled: true,
            cache: Mutex::new(BriefingCache::new()),
        }
    }

    /// Turn briefings on or off. When off, events are only forwarded.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether a script has been prepared for `id`.
    pub async fn is_prepared(&self, id: AlarmId) -> bool {
        self.cache.lock().await.contains(id)
    }

    fn applies_to(&self, alarm: &Alarm) -> bool {
        self.enabled && alarm.kind() == AlarmKind::ClockAlarm
    }

    async fn build_request(&self) -> BriefingRequest {
        let today = DateKey::today(&self.clock.now());
        let notes = match self.store.list_notes(Some(today)).await {
            Ok(notes) => notes.into_iter().map(|n| n.content).collect(),
            Err(e) => {
                warn!("cannot load today's notes for briefing: {e}");
                Vec::new()
            }
        };
        BriefingRequest {
            city: self.city.clone(),
            notes,
        }
    }

    async fn fetch_script(&self) -> Result<String> {
        let request = self.build_request().await;
        self.source.fetch(&request).await.map(|b| b.script)
    }

    async fn save_note(&self, script: &str) {
        let now = self.clock.now();
        let note = NewNote::briefing(
            DateKey::today(&now),
            format_briefing_note(script),
            now.timestamp_millis() as f64 / 1000.0,
        );
        if let Err(e) = self.store.put_note(note).await {
            warn!("cannot save briefing note: {e}");
        }
    }
}

#[async_trait]
impl NotificationSink for BriefingCoordinator {
    async fn alarm_prepared(&self, alarm: &Alarm) {
        self.inner.alarm_prepared(alarm).await;
        if !self.applies_to(alarm) {
            return;
        }

        match self.fetch_script().await {
            Ok(script) => {
                debug!(id = %alarm.id, "briefing prepared");
                self.cache.lock().await.insert(alarm.id, script);
            }
            Err(e) => warn!(id = %alarm.id, "briefing preparation failed: {e}"),
        }
    }

    async fn alarm_fired(&self, alarm: &Alarm) {
        self.inner.alarm_fired(alarm).await;
        if !self.applies_to(alarm) {
            return;
        }

        let cached = self.cache.lock().await.take(alarm.id);
        let script = match cached {
            Some(script) => script,
            None => match self.fetch_script().await {
                Ok(script) => script,
                Err(e) => {
                    warn!(id = %alarm.id, "briefing fetch failed, using fallback: {e}");
                    FALLBACK_SCRIPT.to_owned()
                }
            },
        };

        info!(id = %alarm.id, "delivering morning briefing");
        self.inner.briefing_ready(alarm, &script).await;
        self.save_note(&script).await;
    }

    async fn alarm_cancelled(&self, alarm: &Alarm) {
        if self.cache.lock().await.take(alarm.id).is_some() {
            debug!(id = %alarm.id, "dropping prepared briefing");
        }
        self.inner.alarm_cancelled(alarm).await;
    }

    async fn briefing_ready(&self, alarm: &Alarm, script: &str) {
        self.inner.briefing_ready(alarm, script).await;
    }
}
