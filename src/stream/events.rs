//! Typed events produced by the stream decoder.
//!
//! # Event Stream Lifecycle
//!
//! ```text
//! Progress* → Chunk* → (Done | Error)
//! ```
//!
//! `Progress` may interleave with `Chunk`. Exactly one terminal event ends
//! an exchange.

use serde::{Deserialize, Serialize};

/// A decoded event from one chat exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Transient status text ("Searching the web...").
    Progress {
        /// Human-readable status.
        message: String,
    },

    /// A fragment of assistant text.
    Chunk {
        /// The text fragment, to be appended in emission order.
        delta: String,
    },

    /// The exchange completed. `full_text` is authoritative.
    Done {
        /// Final assistant text.
        full_text: String,
        /// Which backend service produced the reply (`"gemini"`, `"none"`, ...).
        service: String,
    },

    /// The exchange failed.
    Error {
        /// Description of what went wrong.
        message: String,
    },
}

impl StreamEvent {
    /// Whether this event ends the exchange.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

/// The JSON record carried after the `data: ` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WireFrame {
    /// `{"status":"progress","message":...}`
    Progress { message: String },
    /// `{"status":"chunk","text":...}`
    Chunk { text: String },
    /// `{"status":"done","full_text":...,"service":...}`
    Done {
        full_text: String,
        #[serde(default = "default_service")]
        service: String,
    },
    /// `{"status":"error","message":...}`
    Error { message: String },
}

fn default_service() -> String {
    "none".to_owned()
}

impl From<WireFrame> for StreamEvent {
    fn from(frame: WireFrame) -> Self {
        match frame {
            WireFrame::Progress { message } => Self::Progress { message },
            WireFrame::Chunk { text } => Self::Chunk { delta: text },
            WireFrame::Done { full_text, service } => Self::Done { full_text, service },
            WireFrame::Error { message } => Self::Error { message },
        }
    }
}
