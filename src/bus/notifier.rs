//! Non-blocking event publishing for write paths.
//!
//! A domain write commits first and then hands its notification to an
//! [`EventNotifier`]. `notify` never waits: the event goes into a bounded
//! queue drained by one background task that publishes it. Failures are
//! logged and counted there instead of being lost inside per-call tasks,
//! and a full queue drops the event and counts that too. The write itself
//! is never failed or rolled back because of notification trouble.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use super::stats::{NotifierStats, incr};
use super::{EventPublisher, NotifierStatsSnapshot};
use crate::domain::Event;

/// Upper bound on a single background publish.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the background publishing queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventNotifier {
    sender: mpsc::Sender<Event>,
    stats: Arc<NotifierStats>,
}

impl EventNotifier {
    /// Starts the background publishing task.
    ///
    /// The task exits once every clone of the returned notifier has been
    /// dropped and the queue is drained; await the handle to flush on
    /// shutdown.
    #[must_use]
    pub fn spawn(publisher: Arc<dyn EventPublisher>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(NotifierStats::default());
        let handle = tokio::spawn(drain(publisher, receiver, Arc::clone(&stats)));
        (Self { sender, stats }, handle)
    }

    /// Queues an event for publishing without waiting.
    ///
    /// Returns `false` if the event was dropped because the queue is full
    /// or the background task is gone.
    pub fn notify(&self, event: Event) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => {
                incr(&self.stats.queued);
                true
            }
            Err(TrySendError::Full(event)) => {
                incr(&self.stats.dropped);
                tracing::warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "notification queue full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                incr(&self.stats.dropped);
                tracing::warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "notification queue closed, dropping event"
                );
                false
            }
        }
    }

    /// Returns a copy of the notifier counters.
    #[must_use]
    pub fn stats(&self) -> NotifierStatsSnapshot {
        self.stats.snapshot()
    }
}

async fn drain(
    publisher: Arc<dyn EventPublisher>,
    mut receiver: mpsc::Receiver<Event>,
    stats: Arc<NotifierStats>,
) {
    while let Some(event) = receiver.recv().await {
        match tokio::time::timeout(PUBLISH_TIMEOUT, publisher.publish(&event)).await {
            Ok(Ok(())) => {
                incr(&stats.published);
                tracing::debug!(event_id = %event.id, event_type = %event.event_type, "notification published");
            }
            Ok(Err(err)) => {
                incr(&stats.failed);
                tracing::error!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    error = %err,
                    "failed to publish notification"
                );
            }
            Err(_) => {
                incr(&stats.failed);
                tracing::error!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "notification publish timed out"
                );
            }
        }
    }
    tracing::debug!("notification queue drained");
}
