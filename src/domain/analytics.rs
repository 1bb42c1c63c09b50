//! The farm analytics read-model.
//!
//! One [`FarmAnalytics`] record exists per farm. It carries the farm's
//! identity plus three independently updated sections (weather, inventory,
//! crops). Each `apply_*` method touches exactly one section, and section
//! timestamps never move backwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FarmId, WeatherSnapshot};

/// Identity fields of a farm as carried by `farm.created`/`farm.updated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmProfile {
    /// Farm identifier.
    pub farm_id: FarmId,
    /// Display name.
    pub name: String,
    /// Owning user id.
    pub owner_id: String,
    /// Optional farm type, e.g. `"orchard"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farm_type: Option<String>,
    /// Optional free-text size, e.g. `"12 ha"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<String>,
    /// Latitude in decimal degrees.
    #[serde(rename = "lat")]
    pub latitude: f64,
    /// Longitude in decimal degrees.
    #[serde(rename = "lon")]
    pub longitude: f64,
}

/// Weather section of the read-model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSection {
    /// Air temperature in °C.
    pub temp_celsius: Option<f64>,
    /// Relative humidity in percent.
    pub humidity: Option<f64>,
    /// Short textual description.
    pub description: Option<String>,
    /// Provider icon code.
    pub icon: Option<String>,
    /// Wind speed in m/s.
    pub wind_speed: Option<f64>,
    /// Rain over the last hour in mm.
    pub rain_1h: Option<f64>,
    /// Provider observation time.
    pub observed_at: Option<DateTime<Utc>>,
    /// When this section was last written.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Inventory section of the read-model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySection {
    /// Items owned by the farm's owner.
    pub total_items: i64,
    /// Items whose status is "Low Stock".
    pub low_stock_count: i64,
    /// When this section was last written.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Crop section of the read-model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropSection {
    /// Croplands on the farm.
    pub total_count: i64,
    /// Croplands whose status is "growing".
    pub growing_count: i64,
    /// When this section was last written.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Denormalized analytics record for one farm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmAnalytics {
    /// Farm identifier.
    pub farm_id: FarmId,
    /// Display name.
    pub farm_name: String,
    /// Owning user id.
    pub owner_id: String,
    /// Optional farm type.
    pub farm_type: Option<String>,
    /// Optional free-text size.
    pub total_size: Option<String>,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Weather section.
    pub weather: WeatherSection,
    /// Inventory section.
    pub inventory: InventorySection,
    /// Crop section.
    pub crops: CropSection,
    /// Optional free-text status set by operators.
    pub overall_status: Option<String>,
    /// Last time any part of the record changed.
    pub analytics_last_updated: DateTime<Utc>,
}

impl FarmAnalytics {
    /// Builds a record with identity fields only and empty sections.
    #[must_use]
    pub fn from_profile(profile: &FarmProfile, now: DateTime<Utc>) -> Self {
        let mut record = Self::placeholder(profile.farm_id.clone(), now);
        record.apply_profile(profile, now);
        record
    }

    /// Builds a record that knows only its farm id. Used when a section
    /// event reaches a farm before its `farm.created`.
    #[must_use]
    pub fn placeholder(farm_id: FarmId, now: DateTime<Utc>) -> Self {
        Self {
            farm_id,
            farm_name: String::new(),
            owner_id: String::new(),
            farm_type: None,
            total_size: None,
            latitude: 0.0,
            longitude: 0.0,
            weather: WeatherSection::default(),
            inventory: InventorySection::default(),
            crops: CropSection::default(),
            overall_status: None,
            analytics_last_updated: now,
        }
    }

    /// Overwrites the identity fields. Sections are left untouched.
    pub fn apply_profile(&mut self, profile: &FarmProfile, now: DateTime<Utc>) {
        self.farm_name.clone_from(&profile.name);
        self.owner_id.clone_from(&profile.owner_id);
        self.farm_type.clone_from(&profile.farm_type);
        self.total_size.clone_from(&profile.total_size);
        self.latitude = profile.latitude;
        self.longitude = profile.longitude;
        self.touch(now);
    }

    /// Replaces the weather section with the snapshot's values.
    pub fn apply_weather(&mut self, snapshot: &WeatherSnapshot, now: DateTime<Utc>) {
        let last_updated = advance(self.weather.last_updated, now);
        self.weather = WeatherSection {
            temp_celsius: snapshot.temp_celsius,
            humidity: snapshot.humidity,
            description: snapshot.description.clone(),
            icon: snapshot.icon.clone(),
            wind_speed: snapshot.wind_speed,
            rain_1h: snapshot.rain_1h,
            observed_at: snapshot.observed_at,
            last_updated: Some(last_updated),
        };
        self.touch(now);
    }

    /// Overwrites the crop counts.
    pub fn apply_crop_counts(&mut self, total_count: i64, growing_count: i64, now: DateTime<Utc>) {
        self.crops = CropSection {
            total_count,
            growing_count,
            last_updated: Some(advance(self.crops.last_updated, now)),
        };
        self.touch(now);
    }

    /// Overwrites the inventory counts.
    pub fn apply_inventory_counts(
        &mut self,
        total_items: i64,
        low_stock_count: i64,
        now: DateTime<Utc>,
    ) {
        self.inventory = InventorySection {
            total_items,
            low_stock_count,
            last_updated: Some(advance(self.inventory.last_updated, now)),
        };
        self.touch(now);
    }

    /// Sets the operator-facing overall status.
    pub fn apply_overall_status(&mut self, status: &str, now: DateTime<Utc>) {
        self.overall_status = Some(status.to_string());
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.analytics_last_updated = self.analytics_last_updated.max(now);
    }
}

/// Moves a section timestamp forward, never back.
fn advance(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    previous.map_or(now, |prev| prev.max(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn profile() -> FarmProfile {
        FarmProfile {
            farm_id: FarmId::generate(),
            name: "Acme".to_string(),
            owner_id: "u1".to_string(),
            farm_type: None,
            total_size: Some("12 ha".to_string()),
            latitude: 10.0,
            longitude: 20.0,
        }
    }

    #[test]
    fn from_profile_has_empty_sections() {
        let record = FarmAnalytics::from_profile(&profile(), Utc::now());
        assert_eq!(record.farm_name, "Acme");
        assert_eq!(record.weather, WeatherSection::default());
        assert_eq!(record.crops, CropSection::default());
        assert_eq!(record.inventory, InventorySection::default());
        assert!(record.overall_status.is_none());
    }

    #[test]
    fn weather_leaves_other_sections_alone() {
        let now = Utc::now();
        let mut record = FarmAnalytics::from_profile(&profile(), now);
        record.apply_crop_counts(3, 1, now);
        record.apply_overall_status("healthy", now);

        let snapshot = WeatherSnapshot {
            temp_celsius: Some(28.5),
            ..WeatherSnapshot::default()
        };
        record.apply_weather(&snapshot, now + Duration::seconds(1));

        assert_eq!(record.weather.temp_celsius, Some(28.5));
        assert_eq!(record.crops.total_count, 3);
        assert_eq!(record.crops.growing_count, 1);
        assert_eq!(record.overall_status.as_deref(), Some("healthy"));
    }

    #[test]
    fn profile_update_keeps_sections() {
        let now = Utc::now();
        let mut record = FarmAnalytics::from_profile(&profile(), now);
        record.apply_inventory_counts(7, 2, now);

        let mut renamed = profile();
        renamed.name = "Acme North".to_string();
        record.apply_profile(&renamed, now);

        assert_eq!(record.farm_name, "Acme North");
        assert_eq!(record.inventory.total_items, 7);
    }

    #[test]
    fn section_timestamps_never_move_back() {
        let now = Utc::now();
        let mut record = FarmAnalytics::from_profile(&profile(), now);
        record.apply_crop_counts(1, 0, now);
        record.apply_crop_counts(2, 1, now - Duration::minutes(5));

        assert_eq!(record.crops.total_count, 2);
        assert_eq!(record.crops.last_updated, Some(now));
        assert_eq!(record.analytics_last_updated, now);
    }
}
