//! Persistence layer: the farm analytics read-model store.
//!
//! [`AnalyticsRepository`] is the contract the projection and the read API
//! use; [`FarmDirectory`] is the one query the weather worker needs from
//! the primary farm tables. Both are implemented by [`PostgresStore`]
//! (`sqlx::PgPool`, one statement per write) and by [`MemoryStore`], used
//! when persistence is disabled and in tests.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use crate::domain::{
    CropSection, FarmAnalytics, FarmId, FarmLocation, FarmProfile, InventorySection,
    WeatherSnapshot,
};
use crate::error::AnalyticsError;

/// Read-model store for [`FarmAnalytics`] records.
///
/// Every write touches one section of one row and is atomic on its own;
/// callers hold no lock across calls. Section timestamps never move
/// backwards.
#[async_trait]
pub trait AnalyticsRepository: Send + Sync + std::fmt::Debug {
    /// Loads the record for `farm_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::FarmNotFound`] if no record exists, or
    /// [`AnalyticsError::Persistence`] on store failure.
    async fn get_farm_analytics(&self, farm_id: &FarmId) -> Result<FarmAnalytics, AnalyticsError>;

    /// Inserts the record or overwrites its identity fields. Weather,
    /// inventory, crop sections and overall status are preserved.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Persistence`] on store failure.
    async fn upsert_farm_base(&self, profile: &FarmProfile) -> Result<(), AnalyticsError>;

    /// Replaces the weather section. Returns `false` if the farm has no
    /// record, in which case nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Persistence`] on store failure.
    async fn update_weather(
        &self,
        farm_id: &FarmId,
        snapshot: &WeatherSnapshot,
    ) -> Result<bool, AnalyticsError>;

    /// Recounts the farm's croplands and overwrites the crop section.
    /// Creates a minimal record if the farm has none yet.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Persistence`] on store failure.
    async fn recompute_crop_stats(&self, farm_id: &FarmId) -> Result<CropSection, AnalyticsError>;

    /// Recounts the inventory owned by the farm's owner and overwrites the
    /// inventory section. Returns `None` if the farm has no record.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Persistence`] on store failure.
    async fn recompute_inventory_stats(
        &self,
        farm_id: &FarmId,
    ) -> Result<Option<InventorySection>, AnalyticsError>;

    /// Deletes the record. Returns `false` if it was already absent.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Persistence`] on store failure.
    async fn delete_farm_analytics(&self, farm_id: &FarmId) -> Result<bool, AnalyticsError>;

    /// Sets the free-text overall status.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::FarmNotFound`] if no record exists, or
    /// [`AnalyticsError::Persistence`] on store failure.
    async fn update_overall_status(
        &self,
        farm_id: &FarmId,
        status: &str,
    ) -> Result<(), AnalyticsError>;

    /// Returns the ids of every record owned by `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Persistence`] on store failure.
    async fn farm_ids_for_owner(&self, owner_id: &str) -> Result<Vec<FarmId>, AnalyticsError>;
}

/// Read access to the primary farm table.
#[async_trait]
pub trait FarmDirectory: Send + Sync + std::fmt::Debug {
    /// Lists every farm whose coordinates are not the (0, 0) sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Persistence`] on store failure.
    async fn list_farms_with_location(&self) -> Result<Vec<FarmLocation>, AnalyticsError>;
}
