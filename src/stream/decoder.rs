//! Incremental decoder for the chat backend's frame stream.
//!
//! Converts arbitrarily chunked text into ordered [`StreamEvent`]s. Only
//! newline-terminated lines starting with `data: ` are decoded; everything
//! else (keep-alive blank lines, stray text) is skipped silently.
//!
//! # Wire Format
//!
//! ```text
//! data: {"status":"progress","message":"Searching..."}
//!
//! data: {"status":"chunk","text":"Hel"}
//!
//! data: {"status":"chunk","text":"lo"}
//!
//! data: {"status":"done","full_text":"Hello","service":"gemini"}
//! ```
//!
//! # Examples
//!
//! ```
//! use liebe::stream::decoder::StreamDecoder;
//! use liebe::stream::StreamEvent;
//!
//! let mut decoder = StreamDecoder::new();
//! assert!(decoder.feed("data: {\"status\":\"chunk\",").is_empty());
//! let events = decoder.feed("\"text\":\"Hi\"}\n");
//! assert_eq!(events, vec![StreamEvent::Chunk { delta: "Hi".into() }]);
//! ```

use tracing::{debug, warn};

use super::events::{StreamEvent, WireFrame};
use crate::error::LiebeError;

/// Prefix that marks a decodable line.
pub const FRAME_MARKER: &str = "data: ";

/// Incremental frame decoder for a single exchange.
///
/// Create one per exchange. Once a terminal event has been emitted, or
/// [`finish`](Self::finish) has been called, further input is ignored.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Last, possibly incomplete, line.
    pending: String,
    /// Bytes of a UTF-8 sequence split across reads.
    byte_tail: Vec<u8>,
    terminated: bool,
    closed: bool,
    decode_failures: usize,
}

impl StreamDecoder {
    /// Create a decoder with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a text fragment and return the events completed by it.
    pub fn feed(&mut self, fragment: &str) -> Vec<StreamEvent> {
        if self.is_finished() {
            debug!(len = fragment.len(), "ignoring input after stream end");
            return Vec::new();
        }

        self.pending.push_str(fragment);
        let Some(last_newline) = self.pending.rfind('\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        let mut events = Vec::new();
        for line in complete.split_terminator('\n') {
            if let Some(event) = self.decode_line(line) {
                let terminal = event.is_terminal();
                events.push(event);
                if terminal {
                    self.terminated = true;
                    self.pending.clear();
                    break;
                }
            }
        }
        events
    }

    /// Feed raw bytes, holding back an incomplete trailing UTF-8 sequence.
    pub fn feed_bytes(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if self.is_finished() {
            debug!(len = chunk.len(), "ignoring bytes after stream end");
            return Vec::new();
        }

        self.byte_tail.extend_from_slice(chunk);
        let mut text = String::with_capacity(self.byte_tail.len());
        let mut rest: &[u8] = &self.byte_tail;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(bad) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        // Incomplete sequence at the end: keep it for the next read.
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }
        self.byte_tail = rest.to_vec();
        self.feed(&text)
    }

    /// Signal end of input.
    ///
    /// A final frame that arrived without a trailing newline is decoded
    /// and returned. The decoder accepts no input afterwards.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.is_finished() {
            return Vec::new();
        }

        if !self.byte_tail.is_empty() {
            let tail = std::mem::take(&mut self.byte_tail);
            self.pending.push_str(&String::from_utf8_lossy(&tail));
        }

        let line = std::mem::take(&mut self.pending);
        self.closed = true;

        match self.decode_line(&line) {
            Some(event) => {
                if event.is_terminal() {
                    self.terminated = true;
                }
                vec![event]
            }
            None => Vec::new(),
        }
    }

    /// Whether a `Done` or `Error` event has been emitted.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Whether the decoder accepts no more input.
    pub fn is_finished(&self) -> bool {
        self.terminated || self.closed
    }

    /// Number of marked lines dropped because they failed to decode.
    pub fn decode_failures(&self) -> usize {
        self.decode_failures
    }

    fn decode_line(&mut self, line: &str) -> Option<StreamEvent> {
        let payload = line.trim().strip_prefix(FRAME_MARKER)?;

        match serde_json::from_str::<WireFrame>(payload) {
            Ok(frame) => Some(frame.into()),
            Err(e) => {
                self.decode_failures += 1;
                let err = LiebeError::Decode(e.to_string());
                warn!(error = %err, frame = payload, "dropping undecodable stream frame");
                None
            }
        }
    }
}

/// Decode a complete frame stream held in memory.
///
/// # Examples
///
/// ```
/// use liebe::stream::decoder::decode_text;
///
/// let events = decode_text("data: {\"status\":\"error\",\"message\":\"quota\"}\n");
/// assert_eq!(events.len(), 1);
/// ```
pub fn decode_text(text: &str) -> Vec<StreamEvent> {
    let mut decoder = StreamDecoder::new();
    let mut events = decoder.feed(text);
    events.extend(decoder.finish());
    events
}
