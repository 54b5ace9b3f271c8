//! Orchestration of chat exchanges and their side effects.
//!
//! [`Assistant::chat`] runs one exchange end to end: it opens the exchange
//! on the [`ChatSession`], posts it through the [`ChatClient`], folds the
//! decoded events back into the session, and on completion extracts
//! directives and carries them out against the [`Store`] and the shared
//! [`AlarmScheduler`].
//!
//! Starting a new exchange supersedes the one in flight: its reader is
//! cancelled and any event it still produces is ignored by the session.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::ChatClient;
use crate::clock::Clock;
use crate::directive::{self, DirectiveRequest, strip_partial_directives};
use crate::error::Result;
use crate::notes::NewNote;
use crate::scheduler::AlarmScheduler;
use crate::scheduler::alarm::{Alarm, AlarmId, AlarmTime, NewAlarm};
use crate::session::{ChatMessage, ChatSession, Completion, ExchangeId, SessionUpdate};
use crate::sink::NotificationSink;
use crate::stream::StreamEvent;
use crate::store::Store;

const MINUTE_MS: i64 = 60_000;

/// Live progress of an exchange, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatUpdate {
    /// Backend status line ("Searching the web...").
    Status(String),
    /// Reply so far, with directive tags removed and any unclosed tag held
    /// back. Usually extends the previous partial; see [`ReplyView`].
    Partial(String),
}

/// How an exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Reply committed to history.
    Completed {
        /// Reply text with directive tags removed.
        cleaned_text: String,
        /// Backend service that produced the reply.
        service: String,
        /// Directives found in the reply, already carried out.
        requests: Vec<DirectiveRequest>,
    },
    /// The exchange failed; the message is fit to show inline.
    Failed(String),
    /// A newer exchange took over before this one finished.
    Superseded,
    /// Nothing was sent because the message was blank.
    Empty,
}

/// What the display should do with the final reply text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTail {
    /// Print this after what is already shown.
    Append(String),
    /// What was shown no longer matches; print the whole reply again.
    Reprint(String),
}

/// Tracks how much of a streamed reply is already on screen.
///
/// Partials are appended only while each one extends the text shown so
/// far. Once one does not, nothing more is appended and [`finish`](Self::finish)
/// asks for a reprint.
#[derive(Debug, Default, Clone)]
pub struct ReplyView {
    shown: String,
    diverged: bool,
}

impl ReplyView {
    /// Nothing shown yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to append for `partial`, if any.
    pub fn advance(&mut self, partial: &str) -> Option<String> {
        if self.diverged {
            return None;
        }
        match partial.strip_prefix(self.shown.as_str()) {
            Some("") => None,
            Some(fresh) => {
                let fresh = fresh.to_owned();
                self.shown = partial.to_owned();
                Some(fresh)
            }
            None => {
                self.diverged = true;
                None
            }
        }
    }

    /// Settle the display against the cleaned final reply.
    pub fn finish(&self, final_text: &str) -> ReplyTail {
        match final_text.strip_prefix(self.shown.as_str()) {
            Some(rest) if !self.diverged => ReplyTail::Append(rest.trim_end().to_owned()),
            _ => ReplyTail::Reprint(final_text.trim().to_owned()),
        }
    }
}

/// Chat session, backend client, and alarm set wired together.
pub struct Assistant {
    client: ChatClient,
    store: Arc<dyn Store>,
    scheduler: Arc<Mutex<AlarmScheduler>>,
    clock: Arc<dyn Clock>,
    sink: Option<Arc<dyn NotificationSink>>,
    session: Mutex<ChatSession>,
    in_flight: Mutex<Option<(ExchangeId, CancellationToken)>>,
}

impl Assistant {
    /// Create an assistant over shared collaborators.
    pub fn new(
        client: ChatClient,
        store: Arc<dyn Store>,
        scheduler: Arc<Mutex<AlarmScheduler>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            store,
            scheduler,
            clock,
            sink: None,
            session: Mutex::new(ChatSession::new()),
            in_flight: Mutex::new(None),
        }
    }

    /// Bound the chat history to `limit` messages.
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.session = Mutex::new(ChatSession::with_history_limit(limit));
        self
    }

    /// Tell `sink` about alarms removed before they fire.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The alarm set shared with the scheduler runner.
    pub fn scheduler(&self) -> Arc<Mutex<AlarmScheduler>> {
        Arc::clone(&self.scheduler)
    }

    /// Committed chat history, oldest first.
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.session.lock().await.history().to_vec()
    }

    /// Run one exchange to completion.
    ///
    /// Progress is reported on `updates` as it arrives; a closed receiver
    /// does not stop the exchange.
    pub async fn chat(
        &self,
        message: &str,
        updates: &mpsc::UnboundedSender<ChatUpdate>,
    ) -> ExchangeOutcome {
        let message = message.trim();
        if message.is_empty() {
            return ExchangeOutcome::Empty;
        }

        let exchange = self.session.lock().await.submit(message);
        let cancel = CancellationToken::new();
        if let Some((previous, token)) = self
            .in_flight
            .lock()
            .await
            .replace((exchange.id, cancel.clone()))
        {
            debug!(exchange = %previous, "cancelling superseded exchange");
            token.cancel();
        }

        let mut events = match self.client.send_exchange(&exchange).await {
            Ok(events) => events,
            Err(e) => {
                self.finish_in_flight(exchange.id).await;
                let update = self.session.lock().await.apply_to(
                    exchange.id,
                    StreamEvent::Error {
                        message: e.message(),
                    },
                );
                return match update {
                    SessionUpdate::Ignored => ExchangeOutcome::Superseded,
                    _ => ExchangeOutcome::Failed(e.message()),
                };
            }
        };

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(exchange = %exchange.id, "exchange superseded, dropping stream");
                    return ExchangeOutcome::Superseded;
                }
                event = events.next() => event,
            };
            let Some(event) = event else {
                // decode_byte_stream always ends with a terminal event
                return ExchangeOutcome::Failed("stream ended unexpectedly".to_owned());
            };

            let mut session = self.session.lock().await;
            match session.apply_to(exchange.id, event) {
                SessionUpdate::Progress(status) => {
                    let _ = updates.send(ChatUpdate::Status(status));
                }
                SessionUpdate::Partial => {
                    let partial = session.partial_text().map(strip_partial_directives);
                    if let Some(partial) = partial {
                        let _ = updates.send(ChatUpdate::Partial(partial));
                    }
                }
                SessionUpdate::Completed(completion) => {
                    drop(session);
                    self.finish_in_flight(exchange.id).await;
                    return self.complete(completion).await;
                }
                SessionUpdate::Failed(message) => {
                    drop(session);
                    self.finish_in_flight(exchange.id).await;
                    return ExchangeOutcome::Failed(message);
                }
                SessionUpdate::Ignored => return ExchangeOutcome::Superseded,
            }
        }
    }

    async fn finish_in_flight(&self, id: ExchangeId) {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.as_ref().is_some_and(|(current, _)| *current == id) {
            *in_flight = None;
        }
    }

    async fn complete(&self, completion: Completion) -> ExchangeOutcome {
        let extraction = directive::extract(&completion.full_text, &self.clock.now());
        for request in &extraction.requests {
            self.execute(request).await;
        }
        info!(
            service = %completion.service,
            directives = extraction.requests.len(),
            "reply committed"
        );
        ExchangeOutcome::Completed {
            cleaned_text: extraction.cleaned_text,
            service: completion.service,
            requests: extraction.requests,
        }
    }

    /// Carry out one directive. Persistence failures are logged only.
    async fn execute(&self, request: &DirectiveRequest) {
        let result = match request {
            DirectiveRequest::CreateAlarm { time } => {
                self.schedule(NewAlarm::clock(*time)).await.map(|_| ())
            }
            DirectiveRequest::CreateTimer {
                fire_at_ms, label, ..
            } => self
                .schedule(NewAlarm::timer(*fire_at_ms, label.clone()))
                .await
                .map(|_| ()),
            DirectiveRequest::CreateNote { content, date_key } => {
                let timestamp = self.clock.now().timestamp_millis() as f64 / 1000.0;
                self.store
                    .put_note(NewNote::regular(*date_key, content.clone(), timestamp))
                    .await
                    .map(|_| ())
            }
        };
        if let Err(e) = result {
            warn!(?request, "directive not persisted: {e}");
        }
    }

    async fn schedule(&self, alarm: NewAlarm) -> Result<Alarm> {
        let alarm = self.store.create_alarm(alarm).await?;
        info!(id = %alarm.id, label = %alarm.label, "alarm scheduled");
        self.scheduler.lock().await.add(alarm.clone());
        Ok(alarm)
    }

    /// Set a clock alarm.
    ///
    /// # Errors
    ///
    /// Returns [`LiebeError::Persistence`](crate::error::LiebeError::Persistence)
    /// if the store rejects it; nothing is scheduled in that case.
    pub async fn add_alarm(&self, time: AlarmTime) -> Result<Alarm> {
        self.schedule(NewAlarm::clock(time)).await
    }

    /// Start a countdown timer of `minutes` from now.
    ///
    /// # Errors
    ///
    /// Returns [`LiebeError::Persistence`](crate::error::LiebeError::Persistence)
    /// if the store rejects it; nothing is scheduled in that case.
    pub async fn add_timer(&self, minutes: u32) -> Result<Alarm> {
        let fire_at = self.clock.now().timestamp_millis() + i64::from(minutes) * MINUTE_MS;
        self.schedule(NewAlarm::timer(fire_at, format!("{minutes}m")))
            .await
    }

    /// Cancel an alarm or timer.
    ///
    /// It stops ringing locally even if the store delete fails.
    ///
    /// # Errors
    ///
    /// Returns [`LiebeError::Persistence`](crate::error::LiebeError::Persistence)
    /// if the store delete fails.
    pub async fn remove_alarm(&self, id: AlarmId) -> Result<()> {
        let removed = self.scheduler.lock().await.remove(id);
        if let Some(alarm) = removed {
            self.cancelled(&alarm).await;
        }
        self.store.delete_alarm(id).await
    }

    async fn cancelled(&self, alarm: &Alarm) {
        if let Some(sink) = &self.sink {
            sink.alarm_cancelled(alarm).await;
        }
    }

    /// Replace the local alarm set with the store's listing.
    ///
    /// # Errors
    ///
    /// Returns [`LiebeError::Persistence`](crate::error::LiebeError::Persistence)
    /// if the listing fails; the local set is left as it was.
    pub async fn resync(&self) -> Result<usize> {
        let alarms = self.store.list_alarms().await?;
        let count = alarms.len();
        let dropped = self.scheduler.lock().await.replace_all(alarms);
        for alarm in &dropped {
            self.cancelled(alarm).await;
        }
        Ok(count)
    }

    /// Load the backend's stored conversation into the session.
    ///
    /// # Errors
    ///
    /// Returns [`LiebeError::Transport`](crate::error::LiebeError::Transport)
    /// if the history cannot be fetched.
    pub async fn restore_history(&self) -> Result<usize> {
        let messages = self.client.fetch_history().await?;
        let mut session = self.session.lock().await;
        session.restore(messages);
        Ok(session.history().len())
    }

    /// Start over: abandon the exchange in flight, clear local history,
    /// and ask the backend to forget the conversation.
    ///
    /// # Errors
    ///
    /// Returns [`LiebeError::Transport`](crate::error::LiebeError::Transport)
    /// if the backend clear fails. Local history is cleared regardless.
    pub async fn new_chat(&self) -> Result<()> {
        if let Some((_, token)) = self.in_flight.lock().await.take() {
            token.cancel();
        }
        self.session.lock().await.clear();
        self.client.clear_history().await
    }
}
