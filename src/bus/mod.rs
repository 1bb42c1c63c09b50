//! Topic-routed publish/subscribe transport for domain events.
//!
//! The seams are the [`EventPublisher`] and [`EventSubscriber`] traits:
//! producers only ever see a publisher, the projection only ever sees a
//! subscriber. [`InMemoryEventBus`] implements both with AMQP topic-exchange
//! semantics: one exclusive, auto-deleting queue per subscription, manual
//! ack, nack-with-requeue on handler failure.
//!
//! [`EventNotifier`] sits in front of a publisher for write paths that must
//! not block on delivery.

pub mod memory;
pub mod notifier;
pub mod routing;
pub mod stats;

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::Event;
use crate::error::AnalyticsError;

pub use memory::{BusOptions, InMemoryEventBus};
pub use notifier::EventNotifier;
pub use stats::{BusStatsSnapshot, NotifierStatsSnapshot};

/// Consumer callback invoked once per delivered message.
///
/// Returning `Ok` acknowledges the message. Returning `Err` negatively
/// acknowledges it with requeue, so it will be delivered again.
#[async_trait]
pub trait EventHandler: Send + Sync + std::fmt::Debug {
    /// Handles one event.
    ///
    /// # Errors
    ///
    /// Any error causes the message to be requeued.
    async fn handle(&self, event: Event) -> Result<(), AnalyticsError>;
}

/// Publishing half of the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync + std::fmt::Debug {
    /// Publishes an event under `events.<event.type>`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Transport`] if the bus is closed and
    /// [`AnalyticsError::Serialization`] if the envelope cannot be encoded.
    /// Either way the event is not guaranteed delivered.
    async fn publish(&self, event: &Event) -> Result<(), AnalyticsError>;
}

/// Subscribing half of the bus.
#[async_trait]
pub trait EventSubscriber: Send + Sync + std::fmt::Debug {
    /// Binds a fresh queue to `events.<event_type>` and starts consuming it
    /// with `handler` on a dedicated task.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Transport`] if the bus is closed and
    /// [`AnalyticsError::InvalidRequest`] for a blank event type.
    async fn subscribe(
        &self,
        event_type: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), AnalyticsError>;
}
