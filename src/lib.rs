//! Liebe: streaming chat client with alarms, timers, and daily notes.
//!
//! The crate talks to an assistant backend that streams its replies and
//! keeps a local alarm scheduler that rings reminders and prepares a
//! morning briefing shortly before a clock alarm.
//!
//! # Architecture
//!
//! - **Stream decoding**: [`stream`] turns arbitrarily chunked `data: {json}`
//!   lines into typed [`StreamEvent`]s
//! - **Session**: [`session::ChatSession`] folds events into a bounded
//!   history, one exchange at a time
//! - **Directives**: [`directive`] pulls `[ALARM:..]`, `[TIMER:..]` and
//!   `[NOTE:..|..]` tags out of a finished reply
//! - **Scheduler**: [`scheduler::AlarmScheduler`] evaluates alarms on each
//!   tick; [`scheduler::SchedulerRunner`] drives it from a tokio task
//! - **Persistence**: [`store::Store`] is the opaque backend for alarms and
//!   notes
//! - **Orchestration**: [`Assistant`] wires the above together

pub mod assistant;
pub mod briefing;
pub mod client;
pub mod clock;
pub mod config;
pub mod directive;
pub mod error;
pub mod notes;
pub mod scheduler;
pub mod session;
pub mod sink;
pub mod store;
pub mod stream;

pub use assistant::{Assistant, ChatUpdate, ExchangeOutcome, ReplyTail, ReplyView};
pub use client::ChatClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LiebeConfig;
pub use error::{LiebeError, Result};
pub use stream::{StreamDecoder, StreamEvent};
