//! Scheduler background loop.
//!
//! Spawns a tokio task that ticks the shared [`AlarmScheduler`] on a fixed
//! interval and dispatches whatever the tick reports: preparations go to the
//! [`NotificationSink`], fired alarms go to the sink and are then deleted
//! from the [`Store`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AlarmScheduler, SchedulerRequest};
use crate::clock::Clock;
use crate::sink::NotificationSink;
use crate::store::Store;

/// Default interval between scheduler ticks.
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Drives an [`AlarmScheduler`] from a periodic tokio task.
#[derive(Clone)]
pub struct SchedulerRunner {
    scheduler: Arc<Mutex<AlarmScheduler>>,
    clock: Arc<dyn Clock>,
    store: Arc<dyn Store>,
    sink: Arc<dyn NotificationSink>,
    tick_interval: Duration,
}

impl SchedulerRunner {
    /// Create a runner over a shared scheduler.
    pub fn new(
        scheduler: Arc<Mutex<AlarmScheduler>>,
        clock: Arc<dyn Clock>,
        store: Arc<dyn Store>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            scheduler,
            clock,
            store,
            sink,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Override the tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// The scheduler this runner drives.
    pub fn scheduler(&self) -> Arc<Mutex<AlarmScheduler>> {
        Arc::clone(&self.scheduler)
    }

    /// Execute one tick and dispatch its requests.
    ///
    /// The scheduler lock is released before any sink or store call so a
    /// slow collaborator never blocks `add`/`remove` from the chat side.
    pub async fn tick_once(&self) -> Vec<SchedulerRequest> {
        let now = self.clock.now();
        let requests = self.scheduler.lock().await.tick(now);

        for request in &requests {
            match request {
                SchedulerRequest::Prepare { alarm } => {
                    self.sink.alarm_prepared(alarm).await;
                }
                SchedulerRequest::Fire { alarm } => {
                    self.sink.alarm_fired(alarm).await;
                    if let Err(e) = self.store.delete_alarm(alarm.id).await {
                        warn!(id = %alarm.id, "cannot delete fired alarm: {e}");
                    }
                }
            }
        }
        requests
    }

    /// Start the background loop. It stops when `cancel` is triggered.
    pub fn run(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let count = self.scheduler.lock().await.alarms().len();
            info!("scheduler started with {count} alarms");
            let mut interval = tokio::time::interval(self.tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("scheduler cancelled, stopping");
                        return;
                    }
                    _ = interval.tick() => {
                        self.tick_once().await;
                    }
                }
            }
        })
    }
}
