//! Conversation state for the chat view.
//!
//! [`ChatSession`] owns a bounded [`SessionHistory`] and the accumulator
//! for the assistant reply currently streaming in. Stream events are folded
//! in with [`ChatSession::apply_to`]; only a `Done` event commits the
//! assistant reply to history.
//!
//! Each [`ChatSession::submit`] opens a new exchange with a fresh
//! [`ExchangeId`]. Events tagged with a superseded id are ignored, so a
//! reply still trickling in from an abandoned request can never touch the
//! session.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::stream::StreamEvent;

/// Default number of messages kept (ten exchanges).
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person typing.
    User,
    /// The backend's reply.
    Assistant,
}

/// A single message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote it.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered message history capped at a fixed length.
///
/// When a push would exceed the limit the oldest messages are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHistory {
    messages: Vec<ChatMessage>,
    limit: usize,
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl SessionHistory {
    /// Create an empty history holding at most `limit` messages.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            messages: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Append a message, evicting the oldest entries beyond the limit.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.truncate_to_limit();
    }

    /// Replace the contents, keeping only the most recent `limit` messages.
    pub fn replace(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
        self.truncate_to_limit();
    }

    /// Remove every message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Messages in insertion order.
    pub fn as_slice(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages held.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no messages are held.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Maximum number of messages held.
    pub fn limit(&self) -> usize {
        self.limit
    }

    fn truncate_to_limit(&mut self) {
        if self.messages.len() > self.limit {
            let excess = self.messages.len() - self.limit;
            self.messages.drain(..excess);
        }
    }
}

/// Identifies one exchange within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId(u64);

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exchange-{}", self.0)
    }
}

/// A freshly opened exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// Tag for events belonging to this exchange.
    pub id: ExchangeId,
    /// The user's message.
    pub message: String,
    /// History as it stood before `message` was appended.
    pub prior_history: Vec<ChatMessage>,
}

/// The committed result of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Authoritative final assistant text.
    pub full_text: String,
    /// Backend service that produced it.
    pub service: String,
}

/// What applying one event did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Status text changed.
    Progress(String),
    /// Accumulated assistant text grew.
    Partial,
    /// Reply committed to history.
    Completed(Completion),
    /// Exchange failed; history unchanged.
    Failed(String),
    /// Event did not belong to the open exchange.
    Ignored,
}

#[derive(Debug)]
struct OpenExchange {
    id: ExchangeId,
    accumulator: String,
}

/// Conversation history plus the in-flight reply.
#[derive(Debug, Default)]
pub struct ChatSession {
    history: SessionHistory,
    open: Option<OpenExchange>,
    status: Option<String>,
    next_id: u64,
}

impl ChatSession {
    /// Create an empty session with the default history limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session holding at most `limit` messages.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            history: SessionHistory::with_limit(limit),
            ..Self::default()
        }
    }

    /// Start an exchange.
    ///
    /// The user message is committed immediately, whatever the outcome of
    /// the stream. Any exchange still open is abandoned.
    pub fn submit(&mut self, message: impl Into<String>) -> Exchange {
        let message = message.into();

        if let Some(previous) = self.open.take() {
            warn!(
                exchange = %previous.id,
                partial_len = previous.accumulator.len(),
                "abandoning unfinished exchange"
            );
        }

        let prior_history = self.history.as_slice().to_vec();
        self.history.push(ChatMessage::user(message.clone()));

        self.next_id += 1;
        let id = ExchangeId(self.next_id);
        self.open = Some(OpenExchange {
            id,
            accumulator: String::new(),
        });
        self.status = None;

        Exchange {
            id,
            message,
            prior_history,
        }
    }

    /// Fold an event into the currently open exchange.
    pub fn apply(&mut self, event: StreamEvent) -> SessionUpdate {
        match self.open.as_ref().map(|open| open.id) {
            Some(id) => self.apply_to(id, event),
            None => {
                debug!("no open exchange, ignoring event");
                SessionUpdate::Ignored
            }
        }
    }

    /// Fold an event tagged with `exchange` into the session.
    ///
    /// Events for any exchange other than the open one are ignored.
    pub fn apply_to(&mut self, exchange: ExchangeId, event: StreamEvent) -> SessionUpdate {
        let Some(open) = self.open.as_mut().filter(|open| open.id == exchange) else {
            debug!(%exchange, "ignoring event from superseded exchange");
            return SessionUpdate::Ignored;
        };

        match event {
            StreamEvent::Progress { message } => {
                self.status = Some(message.clone());
                SessionUpdate::Progress(message)
            }
            StreamEvent::Chunk { delta } => {
                open.accumulator.push_str(&delta);
                SessionUpdate::Partial
            }
            StreamEvent::Done { full_text, service } => {
                self.open = None;
                self.status = None;
                self.history.push(ChatMessage::assistant(full_text.clone()));
                info!(%exchange, %service, len = full_text.len(), "exchange completed");
                SessionUpdate::Completed(Completion { full_text, service })
            }
            StreamEvent::Error { message } => {
                self.open = None;
                self.status = None;
                warn!(%exchange, error = %message, "exchange failed");
                SessionUpdate::Failed(message)
            }
        }
    }

    /// Abandon the open exchange, if any. History is untouched.
    pub fn cancel(&mut self) -> Option<ExchangeId> {
        self.status = None;
        self.open.take().map(|open| open.id)
    }

    /// Assistant text accumulated so far for the open exchange.
    pub fn partial_text(&self) -> Option<&str> {
        self.open.as_ref().map(|open| open.accumulator.as_str())
    }

    /// Latest progress status for the open exchange.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Id of the open exchange.
    pub fn open_exchange(&self) -> Option<ExchangeId> {
        self.open.as_ref().map(|open| open.id)
    }

    /// Committed messages, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        self.history.as_slice()
    }

    /// Seed the history, e.g. from the backend on start-up.
    pub fn restore(&mut self, messages: Vec<ChatMessage>) {
        self.history.replace(messages);
    }

    /// Start a new chat: drop history and any open exchange.
    pub fn clear(&mut self) {
        self.open = None;
        self.status = None;
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(s: &str) -> StreamEvent {
        StreamEvent::Chunk { delta: s.into() }
    }

    fn done(s: &str) -> StreamEvent {
        StreamEvent::Done {
            full_text: s.into(),
            service: "gemini".into(),
        }
    }

    // ── SessionHistory ────────────────────────────────────────

    #[test]
    fn history_evicts_oldest_first() {
        let mut history = SessionHistory::with_limit(3);
        for i in 0..5 {
            history.push(ChatMessage::user(format!("m{i}")));
        }
        let contents: Vec<&str> = history.as_slice().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn history_replace_keeps_tail() {
        let mut history = SessionHistory::with_limit(2);
        history.replace(vec![
            ChatMessage::user("a"),
            ChatMessage::assistant("b"),
            ChatMessage::user("c"),
        ]);
        assert_eq!(history.len(), 2);
        assert_eq!(history.as_slice()[0].content, "b");
    }

    #[test]
    fn zero_limit_is_clamped() {
        assert_eq!(SessionHistory::with_limit(0).limit(), 1);
    }

    // ── ChatSession ───────────────────────────────────────────

    #[test]
    fn submit_appends_user_message_immediately() {
        let mut session = ChatSession::new();
        let exchange = session.submit("hello");
        assert_eq!(session.history(), &[ChatMessage::user("hello")]);
        assert!(exchange.prior_history.is_empty());
        assert_eq!(session.open_exchange(), Some(exchange.id));
    }

    #[test]
    fn chunks_accumulate_in_order() {
        let mut session = ChatSession::new();
        session.submit("hi");
        assert_eq!(session.apply(chunk("Hel")), SessionUpdate::Partial);
        session.apply(chunk("lo"));
        assert_eq!(session.partial_text(), Some("Hello"));
    }

    #[test]
    fn done_replaces_accumulator_with_full_text() {
        let mut session = ChatSession::new();
        session.submit("hi");
        session.apply(chunk("Hel"));
        let update = session.apply(done("Hello there."));
        assert_eq!(
            update,
            SessionUpdate::Completed(Completion {
                full_text: "Hello there.".into(),
                service: "gemini".into()
            })
        );
        assert_eq!(session.history()[1], ChatMessage::assistant("Hello there."));
        assert!(session.partial_text().is_none());
    }

    #[test]
    fn progress_only_touches_status() {
        let mut session = ChatSession::new();
        session.submit("hi");
        let update = session.apply(StreamEvent::Progress {
            message: "Searching".into(),
        });
        assert_eq!(update, SessionUpdate::Progress("Searching".into()));
        assert_eq!(session.status(), Some("Searching"));
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn error_leaves_history_alone() {
        let mut session = ChatSession::new();
        session.submit("hi");
        session.apply(chunk("partial"));
        let update = session.apply(StreamEvent::Error {
            message: "backend down".into(),
        });
        assert_eq!(update, SessionUpdate::Failed("backend down".into()));
        assert_eq!(session.history(), &[ChatMessage::user("hi")]);
        assert!(session.partial_text().is_none());
    }

    #[test]
    fn each_exchange_adds_two_and_caps_at_twenty() {
        let mut session = ChatSession::new();
        for i in 0..10 {
            let before = session.history().len();
            session.submit(format!("q{i}"));
            session.apply(done(&format!("a{i}")));
            assert_eq!(session.history().len(), before + 2);
        }
        assert_eq!(session.history().len(), 20);

        session.submit("q10");
        session.apply(done("a10"));
        assert_eq!(session.history().len(), 20);
        assert_eq!(session.history()[0].content, "q1");
        assert_eq!(session.history()[19].content, "a10");
    }

    #[test]
    fn superseded_exchange_events_are_ignored() {
        let mut session = ChatSession::new();
        let first = session.submit("first");
        session.apply_to(first.id, chunk("stale"));
        let second = session.submit("second");

        assert_eq!(session.apply_to(first.id, done("late")), SessionUpdate::Ignored);
        assert_eq!(session.partial_text(), Some(""));

        session.apply_to(second.id, done("fresh"));
        let contents: Vec<&str> = session.history().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "fresh"]);
    }

    #[test]
    fn prior_history_excludes_current_message() {
        let mut session = ChatSession::new();
        session.submit("one");
        session.apply(done("uno"));
        let exchange = session.submit("two");
        assert_eq!(
            exchange.prior_history,
            vec![ChatMessage::user("one"), ChatMessage::assistant("uno")]
        );
    }

    #[test]
    fn events_without_open_exchange_are_ignored() {
        let mut session = ChatSession::new();
        assert_eq!(session.apply(chunk("x")), SessionUpdate::Ignored);
    }

    #[test]
    fn cancel_discards_accumulator() {
        let mut session = ChatSession::new();
        let exchange = session.submit("hi");
        session.apply(chunk("abc"));
        assert_eq!(session.cancel(), Some(exchange.id));
        assert_eq!(session.apply_to(exchange.id, done("abc")), SessionUpdate::Ignored);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn clear_resets_everything() {
        let mut session = ChatSession::new();
        session.submit("hi");
        session.clear();
        assert!(session.history().is_empty());
        assert!(session.open_exchange().is_none());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("x")).unwrap_or_default();
        assert_eq!(json, r#"{"role":"assistant","content":"x"}"#);
    }
}
