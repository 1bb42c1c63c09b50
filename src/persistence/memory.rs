//! In-memory implementation of the read-model store.
//!
//! Holds the analytics records together with the slices of the primary
//! tables (farms, croplands, inventory) the projection reads. One
//! `tokio::sync::RwLock` guards everything, so each trait call is atomic
//! the way a single SQL statement is.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{AnalyticsRepository, FarmDirectory};
use crate::domain::{
    CropSection, Cropland, FarmAnalytics, FarmId, FarmLocation, FarmProfile, InventoryItem,
    InventorySection, InventoryStatus, WeatherSnapshot,
};
use crate::error::AnalyticsError;

#[derive(Debug, Default)]
struct Tables {
    analytics: HashMap<FarmId, FarmAnalytics>,
    farms: HashMap<FarmId, FarmLocation>,
    croplands: HashMap<String, Cropland>,
    inventory: HashMap<String, InventoryItem>,
}

/// Process-local store for running without PostgreSQL.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a farm in the primary farm table.
    pub async fn put_farm(&self, farm: FarmLocation) {
        self.tables
            .write()
            .await
            .farms
            .insert(farm.farm_id.clone(), farm);
    }

    /// Removes a farm and its croplands from the primary tables.
    pub async fn remove_farm(&self, farm_id: &FarmId) {
        let mut tables = self.tables.write().await;
        tables.farms.remove(farm_id);
        tables.croplands.retain(|_, c| &c.farm_id != farm_id);
    }

    /// Inserts or replaces a cropland.
    pub async fn put_cropland(&self, cropland: Cropland) {
        self.tables
            .write()
            .await
            .croplands
            .insert(cropland.id.clone(), cropland);
    }

    /// Removes a cropland by id.
    pub async fn remove_cropland(&self, cropland_id: &str) {
        self.tables.write().await.croplands.remove(cropland_id);
    }

    /// Inserts or replaces an inventory item.
    pub async fn put_inventory_item(&self, item: InventoryItem) {
        self.tables
            .write()
            .await
            .inventory
            .insert(item.id.clone(), item);
    }

    /// Removes an inventory item by id.
    pub async fn remove_inventory_item(&self, item_id: &str) {
        self.tables.write().await.inventory.remove(item_id);
    }

    /// Returns the number of analytics records.
    pub async fn analytics_count(&self) -> usize {
        self.tables.read().await.analytics.len()
    }
}

#[async_trait]
impl AnalyticsRepository for MemoryStore {
    async fn get_farm_analytics(&self, farm_id: &FarmId) -> Result<FarmAnalytics, AnalyticsError> {
        self.tables
            .read()
            .await
            .analytics
            .get(farm_id)
            .cloned()
            .ok_or_else(|| AnalyticsError::FarmNotFound(farm_id.to_string()))
    }

    async fn upsert_farm_base(&self, profile: &FarmProfile) -> Result<(), AnalyticsError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        tables
            .analytics
            .entry(profile.farm_id.clone())
            .and_modify(|record| record.apply_profile(profile, now))
            .or_insert_with(|| FarmAnalytics::from_profile(profile, now));
        Ok(())
    }

    async fn update_weather(
        &self,
        farm_id: &FarmId,
        snapshot: &WeatherSnapshot,
    ) -> Result<bool, AnalyticsError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        let Some(record) = tables.analytics.get_mut(farm_id) else {
            return Ok(false);
        };
        record.apply_weather(snapshot, now);
        Ok(true)
    }

    async fn recompute_crop_stats(&self, farm_id: &FarmId) -> Result<CropSection, AnalyticsError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        let (total, growing) = tables
            .croplands
            .values()
            .filter(|c| &c.farm_id == farm_id)
            .fold((0_i64, 0_i64), |(total, growing), c| {
                (total + 1, growing + i64::from(c.is_growing()))
            });

        let record = tables
            .analytics
            .entry(farm_id.clone())
            .or_insert_with(|| FarmAnalytics::placeholder(farm_id.clone(), now));
        record.apply_crop_counts(total, growing, now);
        Ok(record.crops.clone())
    }

    async fn recompute_inventory_stats(
        &self,
        farm_id: &FarmId,
    ) -> Result<Option<InventorySection>, AnalyticsError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        let Some(owner_id) = tables.analytics.get(farm_id).map(|r| r.owner_id.clone()) else {
            return Ok(None);
        };

        let (total, low) = tables
            .inventory
            .values()
            .filter(|item| item.user_id == owner_id)
            .fold((0_i64, 0_i64), |(total, low), item| {
                (total + 1, low + i64::from(item.status == InventoryStatus::LowStock))
            });

        let Some(record) = tables.analytics.get_mut(farm_id) else {
            return Ok(None);
        };
        record.apply_inventory_counts(total, low, now);
        Ok(Some(record.inventory.clone()))
    }

    async fn delete_farm_analytics(&self, farm_id: &FarmId) -> Result<bool, AnalyticsError> {
        Ok(self
            .tables
            .write()
            .await
            .analytics
            .remove(farm_id)
            .is_some())
    }

    async fn update_overall_status(
        &self,
        farm_id: &FarmId,
        status: &str,
    ) -> Result<(), AnalyticsError> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        let record = tables
            .analytics
            .get_mut(farm_id)
            .ok_or_else(|| AnalyticsError::FarmNotFound(farm_id.to_string()))?;
        record.apply_overall_status(status, now);
        Ok(())
    }

    async fn farm_ids_for_owner(&self, owner_id: &str) -> Result<Vec<FarmId>, AnalyticsError> {
        let tables = self.tables.read().await;
        let mut ids: Vec<FarmId> = tables
            .analytics
            .values()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| r.farm_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl FarmDirectory for MemoryStore {
    /// Lists located farms from the primary table plus located analytics
    /// records the primary table does not hold.
    async fn list_farms_with_location(&self) -> Result<Vec<FarmLocation>, AnalyticsError> {
        let tables = self.tables.read().await;
        let projected = tables
            .analytics
            .values()
            .filter(|record| !tables.farms.contains_key(&record.farm_id))
            .map(|record| FarmLocation {
                farm_id: record.farm_id.clone(),
                name: record.farm_name.clone(),
                latitude: record.latitude,
                longitude: record.longitude,
            });
        let mut farms: Vec<FarmLocation> = tables
            .farms
            .values()
            .cloned()
            .chain(projected)
            .filter(FarmLocation::has_coordinates)
            .collect();
        farms.sort_by(|a, b| a.farm_id.cmp(&b.farm_id));
        Ok(farms)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn farm_id(raw: &str) -> FarmId {
        let Some(id) = FarmId::parse(raw) else {
            panic!("invalid farm id");
        };
        id
    }

    fn profile(id: &str, owner: &str) -> FarmProfile {
        FarmProfile {
            farm_id: farm_id(id),
            name: "Acme".to_string(),
            owner_id: owner.to_string(),
            farm_type: None,
            total_size: None,
            latitude: 10.0,
            longitude: 20.0,
        }
    }

    fn cropland(id: &str, farm: &str, status: &str) -> Cropland {
        Cropland {
            id: id.to_string(),
            farm_id: farm_id(farm),
            name: id.to_string(),
            status: status.to_string(),
        }
    }

    fn item(id: &str, owner: &str, status: InventoryStatus) -> InventoryItem {
        InventoryItem {
            id: id.to_string(),
            user_id: owner.to_string(),
            name: id.to_string(),
            quantity: 1.0,
            status,
        }
    }

    #[tokio::test]
    async fn upsert_preserves_sections() {
        let store = MemoryStore::new();
        let id = farm_id("f1");
        assert!(store.upsert_farm_base(&profile("f1", "u1")).await.is_ok());
        let _ = store.update_overall_status(&id, "healthy").await;

        let mut renamed = profile("f1", "u1");
        renamed.name = "Acme Two".to_string();
        assert!(store.upsert_farm_base(&renamed).await.is_ok());

        let Ok(record) = store.get_farm_analytics(&id).await else {
            panic!("record missing");
        };
        assert_eq!(record.farm_name, "Acme Two");
        assert_eq!(record.overall_status.as_deref(), Some("healthy"));
    }

    #[tokio::test]
    async fn weather_on_missing_record_is_a_noop() {
        let store = MemoryStore::new();
        let Ok(updated) = store
            .update_weather(&farm_id("ghost"), &WeatherSnapshot::default())
            .await
        else {
            panic!("update failed");
        };
        assert!(!updated);
        assert_eq!(store.analytics_count().await, 0);
    }

    #[tokio::test]
    async fn crop_recompute_counts_growing_case_insensitively() {
        let store = MemoryStore::new();
        store.put_cropland(cropland("c1", "f1", "Growing")).await;
        store.put_cropland(cropland("c2", "f1", "planned")).await;
        store.put_cropland(cropland("c3", "f2", "growing")).await;

        let Ok(section) = store.recompute_crop_stats(&farm_id("f1")).await else {
            panic!("recompute failed");
        };
        assert_eq!(section.total_count, 2);
        assert_eq!(section.growing_count, 1);

        let Ok(record) = store.get_farm_analytics(&farm_id("f1")).await else {
            panic!("placeholder missing");
        };
        assert!(record.farm_name.is_empty());
    }

    #[tokio::test]
    async fn inventory_recompute_goes_through_owner() {
        let store = MemoryStore::new();
        assert!(store.upsert_farm_base(&profile("f1", "u1")).await.is_ok());
        store.put_inventory_item(item("i1", "u1", InventoryStatus::InStock)).await;
        store.put_inventory_item(item("i2", "u1", InventoryStatus::LowStock)).await;
        store.put_inventory_item(item("i3", "u2", InventoryStatus::LowStock)).await;

        let Ok(Some(section)) = store.recompute_inventory_stats(&farm_id("f1")).await else {
            panic!("recompute failed");
        };
        assert_eq!(section.total_items, 2);
        assert_eq!(section.low_stock_count, 1);

        let Ok(missing) = store.recompute_inventory_stats(&farm_id("nope")).await else {
            panic!("recompute failed");
        };
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn delete_reports_absence() {
        let store = MemoryStore::new();
        let id = farm_id("f1");
        assert!(store.upsert_farm_base(&profile("f1", "u1")).await.is_ok());

        assert!(matches!(store.delete_farm_analytics(&id).await, Ok(true)));
        assert!(matches!(store.delete_farm_analytics(&id).await, Ok(false)));
        assert!(matches!(
            store.get_farm_analytics(&id).await,
            Err(AnalyticsError::FarmNotFound(_))
        ));
    }

    #[tokio::test]
    async fn status_on_missing_record_is_not_found() {
        let store = MemoryStore::new();
        let result = store.update_overall_status(&farm_id("f1"), "ok").await;
        assert!(matches!(result, Err(AnalyticsError::FarmNotFound(_))));
    }

    #[tokio::test]
    async fn owner_lookup_and_location_listing() {
        let store = MemoryStore::new();
        assert!(store.upsert_farm_base(&profile("f2", "u1")).await.is_ok());
        assert!(store.upsert_farm_base(&profile("f1", "u1")).await.is_ok());
        assert!(store.upsert_farm_base(&profile("f3", "u2")).await.is_ok());

        let Ok(ids) = store.farm_ids_for_owner("u1").await else {
            panic!("lookup failed");
        };
        assert_eq!(ids, vec![farm_id("f1"), farm_id("f2")]);

        for (id, lat, lon) in [("a", 1.0, 2.0), ("b", 0.0, 0.0), ("c", 0.0, 5.0)] {
            store
                .put_farm(FarmLocation {
                    farm_id: farm_id(id),
                    name: id.to_string(),
                    latitude: lat,
                    longitude: lon,
                })
                .await;
        }
        let Ok(farms) = store.list_farms_with_location().await else {
            panic!("listing failed");
        };
        let listed: Vec<&str> = farms.iter().map(|f| f.farm_id.as_str()).collect();
        assert_eq!(listed, vec!["a", "c", "f1", "f2", "f3"]);
    }

    #[tokio::test]
    async fn location_listing_prefers_primary_rows() {
        let store = MemoryStore::new();
        assert!(store.upsert_farm_base(&profile("f1", "u1")).await.is_ok());
        let mut unlocated = profile("f2", "u1");
        unlocated.latitude = 0.0;
        unlocated.longitude = 0.0;
        assert!(store.upsert_farm_base(&unlocated).await.is_ok());
        store
            .put_farm(FarmLocation {
                farm_id: farm_id("f1"),
                name: "Primary".to_string(),
                latitude: 1.0,
                longitude: 2.0,
            })
            .await;

        let Ok(farms) = store.list_farms_with_location().await else {
            panic!("listing failed");
        };
        let [farm] = farms.as_slice() else {
            panic!("expected one located farm, got {farms:?}");
        };
        assert_eq!(farm.name, "Primary");
        assert_eq!(farm.latitude, 1.0);

        assert!(store.delete_farm_analytics(&farm_id("f1")).await.is_ok());
        store.remove_farm(&farm_id("f1")).await;
        let Ok(farms) = store.list_farms_with_location().await else {
            panic!("listing failed");
        };
        assert!(farms.is_empty());
    }

    #[tokio::test]
    async fn removing_a_farm_drops_its_croplands() {
        let store = MemoryStore::new();
        store
            .put_farm(FarmLocation {
                farm_id: farm_id("f1"),
                name: "Acme".to_string(),
                latitude: 1.0,
                longitude: 2.0,
            })
            .await;
        store.put_cropland(cropland("c1", "f1", "growing")).await;
        store.put_cropland(cropland("c2", "f2", "growing")).await;

        store.remove_farm(&farm_id("f1")).await;

        let Ok(farms) = store.list_farms_with_location().await else {
            panic!("listing failed");
        };
        assert!(farms.is_empty());
        let Ok(section) = store.recompute_crop_stats(&farm_id("f1")).await else {
            panic!("recompute failed");
        };
        assert_eq!(section.total_count, 0);
    }
}
