//! Delivery counters for the bus and the write-path notifier.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use utoipa::ToSchema;

/// Live counters kept by [`super::InMemoryEventBus`].
#[derive(Debug, Default)]
pub(crate) struct BusStats {
    pub(crate) published: AtomicU64,
    pub(crate) unrouted: AtomicU64,
    pub(crate) delivered: AtomicU64,
    pub(crate) acked: AtomicU64,
    pub(crate) requeued: AtomicU64,
    pub(crate) dead_lettered: AtomicU64,
    pub(crate) malformed: AtomicU64,
}

/// Bumps a counter by one.
pub(crate) fn incr(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl BusStats {
    pub(crate) fn snapshot(&self) -> BusStatsSnapshot {
        BusStatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the bus counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BusStatsSnapshot {
    /// Events accepted by `publish`.
    pub published: u64,
    /// Published events no queue was bound for.
    pub unrouted: u64,
    /// Messages handed to a handler, redeliveries included.
    pub delivered: u64,
    /// Messages acknowledged.
    pub acked: u64,
    /// Messages nacked and put back on their queue.
    pub requeued: u64,
    /// Messages dropped after exceeding the redelivery ceiling.
    pub dead_lettered: u64,
    /// Message bodies that did not decode into an envelope.
    pub malformed: u64,
}

/// Live counters kept by [`super::EventNotifier`].
#[derive(Debug, Default)]
pub(crate) struct NotifierStats {
    pub(crate) queued: AtomicU64,
    pub(crate) published: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) dropped: AtomicU64,
}

impl NotifierStats {
    pub(crate) fn snapshot(&self) -> NotifierStatsSnapshot {
        NotifierStatsSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the notifier counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct NotifierStatsSnapshot {
    /// Events accepted into the queue.
    pub queued: u64,
    /// Events the background task published.
    pub published: u64,
    /// Events whose publish failed or timed out.
    pub failed: u64,
    /// Events rejected because the queue was full or shut down.
    pub dropped: u64,
}
