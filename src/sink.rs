//! Where scheduler events go.
//!
//! The scheduler decides *when*; a [`NotificationSink`] decides what the
//! user sees or hears. Presentation is out of scope for the library, so the
//! only built-in sink writes to the log.

use async_trait::async_trait;
use tracing::info;

use crate::scheduler::alarm::Alarm;

/// Receiver of scheduler and briefing events.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// A clock alarm entered its preparation window.
    async fn alarm_prepared(&self, _alarm: &Alarm) {}

    /// An alarm or timer fired.
    async fn alarm_fired(&self, alarm: &Alarm);

    /// An alarm was removed before it fired.
    async fn alarm_cancelled(&self, _alarm: &Alarm) {}

    /// A briefing script is ready to be delivered.
    async fn briefing_ready(&self, _alarm: &Alarm, _script: &str) {}
}

/// Sink that reports every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn alarm_prepared(&self, alarm: &Alarm) {
        info!(id = %alarm.id, label = %alarm.label, "preparing for alarm");
    }

    async fn alarm_fired(&self, alarm: &Alarm) {
        info!(id = %alarm.id, kind = ?alarm.kind(), label = %alarm.label, "⏰ {} is ringing", alarm.label);
    }

    async fn alarm_cancelled(&self, alarm: &Alarm) {
        info!(id = %alarm.id, label = %alarm.label, "alarm cancelled");
    }

    async fn briefing_ready(&self, alarm: &Alarm, script: &str) {
        info!(id = %alarm.id, "briefing: {script}");
    }
}
