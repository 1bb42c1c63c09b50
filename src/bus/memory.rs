//! In-process topic exchange.
//!
//! [`InMemoryEventBus`] routes published envelopes to every queue whose
//! binding pattern matches `events.<type>`. Each [`EventSubscriber::subscribe`]
//! call declares its own exclusive, auto-deleting queue and spawns a
//! consumer task that invokes the handler one message at a time, so a slow
//! handler only backs up its own queue.
//!
//! Messages travel as serialized envelope bytes, exactly as they would on a
//! broker, and are decoded again on the consumer side. A handler error
//! requeues the message at the tail of its queue; redelivery is unbounded
//! unless [`BusOptions::max_redeliveries`] is set.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use super::routing;
use super::stats::{BusStats, incr};
use super::{BusStatsSnapshot, EventHandler, EventPublisher, EventSubscriber};
use crate::domain::Event;
use crate::domain::event::{EXCHANGE_NAME, routing_key_for};
use crate::error::AnalyticsError;

/// Tuning knobs for [`InMemoryEventBus`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BusOptions {
    /// Redeliveries allowed after a handler failure before the message is
    /// dead-lettered. `None` requeues forever.
    pub max_redeliveries: Option<u32>,
}

/// In-process implementation of [`EventPublisher`] and [`EventSubscriber`].
///
/// Cheap to clone; clones share the same exchange.
#[derive(Debug, Clone)]
pub struct InMemoryEventBus {
    inner: Arc<Exchange>,
}

#[derive(Debug)]
struct Exchange {
    queues: RwLock<Vec<QueueBinding>>,
    closed: watch::Sender<bool>,
    stats: BusStats,
    options: BusOptions,
}

#[derive(Debug)]
struct QueueBinding {
    queue: String,
    pattern: String,
    sender: mpsc::UnboundedSender<Delivery>,
}

#[derive(Debug)]
struct Delivery {
    body: Arc<[u8]>,
    redeliveries: u32,
}

impl InMemoryEventBus {
    /// Declares a new exchange.
    #[must_use]
    pub fn new(options: BusOptions) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(Exchange {
                queues: RwLock::new(Vec::new()),
                closed,
                stats: BusStats::default(),
                options,
            }),
        }
    }

    /// Returns a copy of the delivery counters.
    #[must_use]
    pub fn stats(&self) -> BusStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Returns the number of live queues.
    #[must_use]
    pub fn queue_count(&self) -> usize {
        self.inner
            .queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` once [`Self::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Tears the exchange down: every queue is deleted and every consumer
    /// task stops after the message it is currently handling. Further
    /// publish or subscribe calls fail with a transport error.
    ///
    /// Calling it more than once is harmless.
    pub fn close(&self) {
        if self.inner.closed.send_replace(true) {
            tracing::debug!(exchange = EXCHANGE_NAME, "event bus already closed");
            return;
        }
        let removed = std::mem::take(
            &mut *self
                .inner
                .queues
                .write()
                .unwrap_or_else(PoisonError::into_inner),
        );
        tracing::info!(exchange = EXCHANGE_NAME, queues = removed.len(), "event bus closed");
    }

    fn ensure_open(&self) -> Result<(), AnalyticsError> {
        if self.is_closed() {
            return Err(AnalyticsError::Transport(format!(
                "exchange '{EXCHANGE_NAME}' is closed"
            )));
        }
        Ok(())
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(BusOptions::default())
    }
}

impl Exchange {
    fn unbind(&self, queue: &str) {
        self.queues
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|binding| binding.queue != queue);
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: &Event) -> Result<(), AnalyticsError> {
        self.ensure_open()?;
        let body: Arc<[u8]> = event.to_body()?.into();
        let routing_key = event.routing_key();

        let mut routed = 0usize;
        {
            let queues = self
                .inner
                .queues
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            for binding in queues
                .iter()
                .filter(|binding| routing::matches(&binding.pattern, &routing_key))
            {
                let delivery = Delivery {
                    body: Arc::clone(&body),
                    redeliveries: 0,
                };
                if binding.sender.send(delivery).is_ok() {
                    routed += 1;
                }
            }
        }

        incr(&self.inner.stats.published);
        if routed == 0 {
            incr(&self.inner.stats.unrouted);
        }
        tracing::trace!(
            event_id = %event.id,
            routing_key = %routing_key,
            queues = routed,
            "event published"
        );
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for InMemoryEventBus {
    async fn subscribe(
        &self,
        event_type: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), AnalyticsError> {
        self.ensure_open()?;
        if event_type.trim().is_empty() {
            return Err(AnalyticsError::InvalidRequest(
                "event type must not be empty".to_string(),
            ));
        }

        let queue = format!("amq.gen-{}", uuid::Uuid::new_v4().simple());
        let pattern = routing_key_for(event_type);
        let (sender, receiver) = mpsc::unbounded_channel();
        let requeue = sender.downgrade();

        self.inner
            .queues
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(QueueBinding {
                queue: queue.clone(),
                pattern: pattern.clone(),
                sender,
            });

        tracing::debug!(%queue, binding = %pattern, "queue bound");

        let consumer = Consumer {
            queue,
            receiver,
            requeue,
            handler,
            exchange: Arc::clone(&self.inner),
        };
        tokio::spawn(consumer.run());
        Ok(())
    }
}

/// Consumption loop for one queue.
struct Consumer {
    queue: String,
    receiver: mpsc::UnboundedReceiver<Delivery>,
    requeue: mpsc::WeakUnboundedSender<Delivery>,
    handler: Arc<dyn EventHandler>,
    exchange: Arc<Exchange>,
}

impl Consumer {
    async fn run(mut self) {
        let mut closed = self.exchange.closed.subscribe();
        loop {
            let delivery = tokio::select! {
                biased;
                _ = closed.wait_for(|closed| *closed) => break,
                next = self.receiver.recv() => match next {
                    Some(delivery) => delivery,
                    None => break,
                },
            };
            self.process(delivery).await;
        }
        self.exchange.unbind(&self.queue);
        tracing::debug!(queue = %self.queue, "consumer stopped, queue deleted");
    }

    async fn process(&self, delivery: Delivery) {
        let stats = &self.exchange.stats;
        incr(&stats.delivered);

        let event = match Event::from_body(&delivery.body) {
            Ok(event) => event,
            Err(err) => {
                incr(&stats.malformed);
                tracing::error!(queue = %self.queue, error = %err, "failed to decode event, dropping message");
                return;
            }
        };
        let event_id = event.id.clone();
        let event_type = event.event_type.clone();

        match self.handler.handle(event).await {
            Ok(()) => incr(&stats.acked),
            Err(err) => {
                let redeliveries = delivery.redeliveries.saturating_add(1);
                if let Some(max) = self.exchange.options.max_redeliveries
                    && redeliveries > max
                {
                    incr(&stats.dead_lettered);
                    tracing::error!(
                        queue = %self.queue,
                        %event_id,
                        %event_type,
                        attempts = redeliveries,
                        error = %err,
                        "handler kept failing, dead-lettering message"
                    );
                    return;
                }

                incr(&stats.requeued);
                tracing::warn!(
                    queue = %self.queue,
                    %event_id,
                    %event_type,
                    redeliveries,
                    error = %err,
                    "failed to handle event, requeueing"
                );
                if let Some(sender) = self.requeue.upgrade() {
                    let _ = sender.send(Delivery {
                        body: delivery.body,
                        redeliveries,
                    });
                }
                tokio::task::yield_now().await;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::timeout;

    use super::*;

    #[derive(Debug)]
    struct Recorder {
        tx: mpsc::UnboundedSender<Event>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: Event) -> Result<(), AnalyticsError> {
            let _ = self.tx.send(event);
            Ok(())
        }
    }

    /// Fails the first `failures` calls, then succeeds.
    #[derive(Debug)]
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl EventHandler for Flaky {
        async fn handle(&self, _event: Event) -> Result<(), AnalyticsError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(AnalyticsError::Internal("transient".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn recorder() -> (Arc<dyn EventHandler>, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Recorder { tx }), rx)
    }

    async fn eventually(check: impl Fn() -> bool) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    fn event(event_type: &str) -> Event {
        Event::new(event_type, "test", "f1", json!({"farm_id": "f1"}))
    }

    #[tokio::test]
    async fn publish_without_queues_is_unrouted() {
        let bus = InMemoryEventBus::default();
        assert!(bus.publish(&event("farm.created")).await.is_ok());
        let stats = bus.stats();
        assert_eq!(stats.published, 1);
        assert_eq!(stats.unrouted, 1);
    }

    #[tokio::test]
    async fn subscriber_receives_matching_events_only() {
        let bus = InMemoryEventBus::default();
        let (handler, mut rx) = recorder();
        assert!(bus.subscribe("farm.created", handler).await.is_ok());

        let _ = bus.publish(&event("farm.updated")).await;
        let published = event("farm.created");
        let _ = bus.publish(&published).await;

        let Ok(Some(received)) = timeout(Duration::from_secs(1), rx.recv()).await else {
            panic!("expected an event");
        };
        assert_eq!(received, published);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn every_subscription_gets_its_own_copy() {
        let bus = InMemoryEventBus::default();
        let (first, mut rx1) = recorder();
        let (second, mut rx2) = recorder();
        let _ = bus.subscribe("weather.updated", first).await;
        let _ = bus.subscribe("weather.updated", second).await;
        assert_eq!(bus.queue_count(), 2);

        let _ = bus.publish(&event("weather.updated")).await;

        let Ok(Some(a)) = timeout(Duration::from_secs(1), rx1.recv()).await else {
            panic!("rx1 got nothing");
        };
        let Ok(Some(b)) = timeout(Duration::from_secs(1), rx2.recv()).await else {
            panic!("rx2 got nothing");
        };
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn wildcard_binding_receives_whole_family() {
        let bus = InMemoryEventBus::default();
        let (handler, mut rx) = recorder();
        let _ = bus.subscribe("inventory.item.*", handler).await;

        let _ = bus.publish(&event("inventory.item.created")).await;
        let _ = bus.publish(&event("inventory.item.deleted")).await;

        for expected in ["inventory.item.created", "inventory.item.deleted"] {
            let Ok(Some(received)) = timeout(Duration::from_secs(1), rx.recv()).await else {
                panic!("expected {expected}");
            };
            assert_eq!(received.event_type, expected);
        }
    }

    #[tokio::test]
    async fn failed_handler_gets_redelivery() {
        let bus = InMemoryEventBus::default();
        let flaky = Arc::new(Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let handler: Arc<dyn EventHandler> = Arc::clone(&flaky) as Arc<dyn EventHandler>;
        let _ = bus.subscribe("farm.updated", handler).await;

        let _ = bus.publish(&event("farm.updated")).await;

        assert!(eventually(|| bus.stats().acked == 1).await);
        let stats = bus.stats();
        assert_eq!(stats.requeued, 2);
        assert_eq!(stats.delivered, 3);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn redelivery_ceiling_dead_letters() {
        let bus = InMemoryEventBus::new(BusOptions {
            max_redeliveries: Some(2),
        });
        let handler: Arc<dyn EventHandler> = Arc::new(Flaky {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let _ = bus.subscribe("farm.updated", handler).await;

        let _ = bus.publish(&event("farm.updated")).await;

        assert!(eventually(|| bus.stats().dead_lettered == 1).await);
        let stats = bus.stats();
        assert_eq!(stats.requeued, 2);
        assert_eq!(stats.acked, 0);
    }

    #[tokio::test]
    async fn undecodable_body_is_dropped() {
        let bus = InMemoryEventBus::default();
        let (handler, mut rx) = recorder();
        let _ = bus.subscribe("farm.created", handler).await;

        {
            let queues = bus.inner.queues.read().unwrap_or_else(PoisonError::into_inner);
            let Some(binding) = queues.first() else {
                panic!("queue missing");
            };
            let _ = binding.sender.send(Delivery {
                body: Arc::from(&b"not an envelope"[..]),
                redeliveries: 0,
            });
        }

        assert!(eventually(|| bus.stats().malformed == 1).await);
        assert!(rx.try_recv().is_err());
        assert_eq!(bus.stats().requeued, 0);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_fails_later_calls() {
        let bus = InMemoryEventBus::default();
        let (handler, _rx) = recorder();
        let _ = bus.subscribe("farm.created", Arc::clone(&handler)).await;

        bus.close();
        bus.close();

        assert!(bus.is_closed());
        assert_eq!(bus.queue_count(), 0);
        assert!(matches!(
            bus.publish(&event("farm.created")).await,
            Err(AnalyticsError::Transport(_))
        ));
        assert!(matches!(
            bus.subscribe("farm.created", handler).await,
            Err(AnalyticsError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn blank_event_type_is_rejected() {
        let bus = InMemoryEventBus::default();
        let (handler, _rx) = recorder();
        assert!(matches!(
            bus.subscribe("  ", handler).await,
            Err(AnalyticsError::InvalidRequest(_))
        ));
    }
}
