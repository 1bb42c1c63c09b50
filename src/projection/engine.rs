//! The farm analytics projection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::decode::{InventoryTarget, ProjectionEvent};
use crate::bus::{EventHandler, EventSubscriber};
use crate::domain::{Event, EventType};
use crate::error::AnalyticsError;
use crate::persistence::AnalyticsRepository;

/// Upper bound on applying one event to the store.
const APPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Keeps one [`crate::domain::FarmAnalytics`] record per farm in sync with
/// the event stream.
///
/// Holds no per-farm state: every event is a stateless function of its
/// own contents and the store. Handling always acknowledges: events that
/// cannot be decoded and events whose store write fails are logged and
/// dropped.
#[derive(Debug)]
pub struct FarmAnalyticsProjection {
    repository: Arc<dyn AnalyticsRepository>,
}

impl FarmAnalyticsProjection {
    /// Creates a projection writing to `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn AnalyticsRepository>) -> Self {
        Self { repository }
    }

    /// Subscribes to every event type the projection handles.
    ///
    /// Does not retry. Subscriptions that succeeded stay active when
    /// others fail; the caller decides whether partial coverage is fatal.
    ///
    /// # Errors
    ///
    /// Returns one [`AnalyticsError::Transport`] listing every failed
    /// subscription.
    pub async fn start(
        self: &Arc<Self>,
        subscriber: &dyn EventSubscriber,
    ) -> Result<(), AnalyticsError> {
        let mut failures = Vec::new();
        for event_type in EventType::ALL {
            let handler: Arc<dyn EventHandler> = Arc::clone(self) as Arc<dyn EventHandler>;
            match subscriber.subscribe(event_type.as_str(), handler).await {
                Ok(()) => tracing::debug!(%event_type, "projection subscribed"),
                Err(err) => {
                    tracing::error!(%event_type, error = %err, "projection subscription failed");
                    failures.push(format!("{event_type}: {err}"));
                }
            }
        }

        if failures.is_empty() {
            tracing::info!(types = EventType::ALL.len(), "farm analytics projection started");
            Ok(())
        } else {
            Err(AnalyticsError::Transport(format!(
                "projection subscriptions failed: {}",
                failures.join("; ")
            )))
        }
    }

    /// Applies one decoded event to the store.
    ///
    /// # Errors
    ///
    /// Returns the store's error. For owner-routed inventory changes the
    /// remaining farms are still updated and the last failure is returned.
    pub async fn apply(&self, event: ProjectionEvent) -> Result<(), AnalyticsError> {
        match event {
            ProjectionEvent::FarmUpserted(profile) => {
                self.repository.upsert_farm_base(&profile).await?;
                tracing::info!(farm_id = %profile.farm_id, "farm analytics base upserted");
            }
            ProjectionEvent::FarmDeleted { farm_id } => {
                if self.repository.delete_farm_analytics(&farm_id).await? {
                    tracing::info!(%farm_id, "farm analytics deleted");
                } else {
                    tracing::debug!(%farm_id, "farm analytics already absent");
                }
            }
            ProjectionEvent::WeatherUpdated { farm_id, snapshot } => {
                if self.repository.update_weather(&farm_id, &snapshot).await? {
                    tracing::debug!(%farm_id, "weather section updated");
                } else {
                    tracing::warn!(%farm_id, "weather for farm without analytics record ignored");
                }
            }
            ProjectionEvent::CroplandChanged { farm_id } => {
                let crops = self.repository.recompute_crop_stats(&farm_id).await?;
                tracing::debug!(
                    %farm_id,
                    total = crops.total_count,
                    growing = crops.growing_count,
                    "crop section recomputed"
                );
            }
            ProjectionEvent::InventoryChanged { target } => {
                let farm_ids = match target {
                    InventoryTarget::Farm(farm_id) => vec![farm_id],
                    InventoryTarget::Owner(owner_id) => {
                        let ids = self.repository.farm_ids_for_owner(&owner_id).await?;
                        if ids.is_empty() {
                            tracing::debug!(%owner_id, "inventory owner has no farms");
                        }
                        ids
                    }
                };

                let mut last_error = None;
                for farm_id in farm_ids {
                    match self.repository.recompute_inventory_stats(&farm_id).await {
                        Ok(Some(section)) => tracing::debug!(
                            %farm_id,
                            total = section.total_items,
                            low_stock = section.low_stock_count,
                            "inventory section recomputed"
                        ),
                        Ok(None) => tracing::debug!(
                            %farm_id,
                            "inventory for farm without analytics record ignored"
                        ),
                        Err(err) => {
                            tracing::error!(%farm_id, error = %err, "inventory recompute failed");
                            last_error = Some(err);
                        }
                    }
                }
                if let Some(err) = last_error {
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for FarmAnalyticsProjection {
    async fn handle(&self, event: Event) -> Result<(), AnalyticsError> {
        let decoded = match ProjectionEvent::decode(&event) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    aggregate_id = %event.aggregate_id,
                    error = %err,
                    "event skipped by farm analytics projection"
                );
                return Ok(());
            }
        };

        let kind = decoded.kind();
        match tokio::time::timeout(APPLY_TIMEOUT, self.apply(decoded)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(
                event_id = %event.id,
                event_type = %event.event_type,
                kind,
                error = %err,
                "failed to update farm analytics"
            ),
            Err(_) => tracing::error!(
                event_id = %event.id,
                event_type = %event.event_type,
                kind,
                "farm analytics update timed out"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::bus::{BusOptions, InMemoryEventBus};
    use crate::domain::{
        CropSection, FarmAnalytics, FarmId, FarmProfile, InventorySection, WeatherSnapshot,
    };
    use crate::persistence::MemoryStore;

    #[derive(Debug)]
    struct Broken;

    fn broken() -> AnalyticsError {
        AnalyticsError::Persistence("connection reset".to_string())
    }

    #[async_trait]
    impl AnalyticsRepository for Broken {
        async fn get_farm_analytics(&self, _: &FarmId) -> Result<FarmAnalytics, AnalyticsError> {
            Err(broken())
        }
        async fn upsert_farm_base(&self, _: &FarmProfile) -> Result<(), AnalyticsError> {
            Err(broken())
        }
        async fn update_weather(
            &self,
            _: &FarmId,
            _: &WeatherSnapshot,
        ) -> Result<bool, AnalyticsError> {
            Err(broken())
        }
        async fn recompute_crop_stats(&self, _: &FarmId) -> Result<CropSection, AnalyticsError> {
            Err(broken())
        }
        async fn recompute_inventory_stats(
            &self,
            _: &FarmId,
        ) -> Result<Option<InventorySection>, AnalyticsError> {
            Err(broken())
        }
        async fn delete_farm_analytics(&self, _: &FarmId) -> Result<bool, AnalyticsError> {
            Err(broken())
        }
        async fn update_overall_status(&self, _: &FarmId, _: &str) -> Result<(), AnalyticsError> {
            Err(broken())
        }
        async fn farm_ids_for_owner(&self, _: &str) -> Result<Vec<FarmId>, AnalyticsError> {
            Err(broken())
        }
    }

    fn farm_created(id: &str) -> Event {
        Event::new(
            "farm.created",
            "farm-repository",
            id,
            json!({"name": "Acme", "owner_id": "u1", "lat": 10.0, "lon": 20.0}),
        )
    }

    #[tokio::test]
    async fn store_failures_are_acknowledged() {
        let projection = FarmAnalyticsProjection::new(Arc::new(Broken));
        assert!(projection.handle(farm_created("f1")).await.is_ok());
    }

    #[tokio::test]
    async fn undecodable_events_are_acknowledged() {
        let store = Arc::new(MemoryStore::new());
        let projection =
            FarmAnalyticsProjection::new(Arc::clone(&store) as Arc<dyn AnalyticsRepository>);

        let missing_farm = Event::new("cropland.created", "cropland-repository", "c1", json!({}));
        let unknown = Event::new("pest.detected", "scout", "f1", json!({}));

        assert!(projection.handle(missing_farm).await.is_ok());
        assert!(projection.handle(unknown).await.is_ok());
        assert_eq!(store.analytics_count().await, 0);
    }

    #[tokio::test]
    async fn farm_created_is_applied() {
        let store = Arc::new(MemoryStore::new());
        let projection =
            FarmAnalyticsProjection::new(Arc::clone(&store) as Arc<dyn AnalyticsRepository>);

        assert!(projection.handle(farm_created("f1")).await.is_ok());

        let Some(id) = FarmId::parse("f1") else {
            panic!("bad id");
        };
        let Ok(record) = store.get_farm_analytics(&id).await else {
            panic!("record missing");
        };
        assert_eq!(record.owner_id, "u1");
    }

    #[tokio::test]
    async fn owner_routed_inventory_reports_store_failure() {
        let projection = FarmAnalyticsProjection::new(Arc::new(Broken));
        let result = projection
            .apply(ProjectionEvent::InventoryChanged {
                target: InventoryTarget::Owner("u1".to_string()),
            })
            .await;
        assert!(matches!(result, Err(AnalyticsError::Persistence(_))));
    }

    #[tokio::test]
    async fn start_binds_one_queue_per_type() {
        let bus = InMemoryEventBus::new(BusOptions::default());
        let projection = Arc::new(FarmAnalyticsProjection::new(Arc::new(MemoryStore::new())));

        assert!(projection.start(&bus).await.is_ok());
        assert_eq!(bus.queue_count(), EventType::ALL.len());
        bus.close();
    }

    #[tokio::test]
    async fn start_on_closed_bus_joins_failures() {
        let bus = InMemoryEventBus::new(BusOptions::default());
        bus.close();
        let projection = Arc::new(FarmAnalyticsProjection::new(Arc::new(MemoryStore::new())));

        let Err(AnalyticsError::Transport(message)) = projection.start(&bus).await else {
            panic!("expected transport error");
        };
        assert!(message.contains("farm.created"));
        assert!(message.contains("inventory.item.deleted"));
    }
}
