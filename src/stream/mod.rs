//! Chat stream decoding.
//!
//! [`decoder::StreamDecoder`] turns chunked text into [`StreamEvent`]s;
//! [`decode_byte_stream`] wraps it around a network byte stream as a lazy
//! async sequence that always ends with exactly one terminal event.

pub mod decoder;
pub mod events;

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::warn;

pub use decoder::StreamDecoder;
pub use events::{StreamEvent, WireFrame};

use crate::error::LiebeError;

/// A boxed stream of decoded events.
pub type StreamEventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Decode a byte stream into events.
///
/// A read failure becomes a terminal `Error` event. If the byte stream
/// ends before a terminal frame arrives, an `Error` event is synthesised
/// so every exchange ends exactly once.
pub fn decode_byte_stream<S, E>(byte_stream: S) -> impl Stream<Item = StreamEvent> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    futures_util::stream::unfold(
        DecodeState {
            byte_stream: Box::pin(byte_stream),
            decoder: StreamDecoder::new(),
            buffered: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.buffered.pop_front() {
                    return Some((event, state));
                }
                if state.done {
                    return None;
                }

                match state.byte_stream.next().await {
                    Some(Ok(chunk)) => {
                        state.buffered.extend(state.decoder.feed_bytes(&chunk));
                        if state.decoder.is_terminated() {
                            state.done = true;
                        }
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        let err = LiebeError::Transport(format!("stream read error: {e}"));
                        warn!(error = %err, "chat stream read failed");
                        return Some((
                            StreamEvent::Error {
                                message: err.message(),
                            },
                            state,
                        ));
                    }
                    None => {
                        state.done = true;
                        state.buffered.extend(state.decoder.finish());
                        if !state.decoder.is_terminated() {
                            state.buffered.push_back(StreamEvent::Error {
                                message: "stream ended before the reply completed".to_owned(),
                            });
                        }
                    }
                }
            }
        },
    )
}

struct DecodeState<S> {
    byte_stream: Pin<Box<S>>,
    decoder: StreamDecoder,
    buffered: VecDeque<StreamEvent>,
    done: bool,
}
