//! DTOs for the farm analytics endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    CropSection, FarmAnalytics, InventorySection, WeatherSection, WeatherSnapshot,
};

/// Weather section of an analytics response.
#[derive(Debug, Serialize, ToSchema)]
pub struct WeatherSectionDto {
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
    /// When the section was last written.
    pub last_updated: Option<DateTime<Utc>>,
}

impl From<WeatherSection> for WeatherSectionDto {
    fn from(section: WeatherSection) -> Self {
        Self {
            temp_celsius: section.temp_celsius,
            humidity: section.humidity,
            description: section.description,
            icon: section.icon,
            wind_speed: section.wind_speed,
            rain_1h: section.rain_1h,
            observed_at: section.observed_at,
            last_updated: section.last_updated,
        }
    }
}

/// Inventory section of an analytics response.
#[derive(Debug, Serialize, ToSchema)]
pub struct InventorySectionDto {
    /// Items owned by the farm's owner.
    pub total_items: i64,
    /// Items in low stock.
    pub low_stock_count: i64,
    /// When the section was last written.
    pub last_updated: Option<DateTime<Utc>>,
}

impl From<InventorySection> for InventorySectionDto {
    fn from(section: InventorySection) -> Self {
        Self {
            total_items: section.total_items,
            low_stock_count: section.low_stock_count,
            last_updated: section.last_updated,
        }
    }
}

/// Crop section of an analytics response.
#[derive(Debug, Serialize, ToSchema)]
pub struct CropSectionDto {
    /// Croplands on the farm.
    pub total_count: i64,
    /// Croplands currently growing.
    pub growing_count: i64,
    /// When the section was last written.
    pub last_updated: Option<DateTime<Utc>>,
}

impl From<CropSection> for CropSectionDto {
    fn from(section: CropSection) -> Self {
        Self {
            total_count: section.total_count,
            growing_count: section.growing_count,
            last_updated: section.last_updated,
        }
    }
}

/// Response body for `GET /farms/{farm_id}/analytics`.
#[derive(Debug, Serialize, ToSchema)]
pub struct FarmAnalyticsResponse {
    /// Farm identifier.
    pub farm_id: String,
    /// Display name.
    pub farm_name: String,
    /// Owning user id.
    pub owner_id: String,
    /// Farm type, if known.
    pub farm_type: Option<String>,
    /// Free-text size, if known.
    pub total_size: Option<String>,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Latest weather.
    pub weather: WeatherSectionDto,
    /// Inventory counters.
    pub inventory: InventorySectionDto,
    /// Crop counters.
    pub crops: CropSectionDto,
    /// Operator-set status.
    pub overall_status: Option<String>,
    /// Last time any part of the record changed.
    pub analytics_last_updated: DateTime<Utc>,
}

impl From<FarmAnalytics> for FarmAnalyticsResponse {
    fn from(record: FarmAnalytics) -> Self {
        Self {
            farm_id: record.farm_id.into(),
            farm_name: record.farm_name,
            owner_id: record.owner_id,
            farm_type: record.farm_type,
            total_size: record.total_size,
            latitude: record.latitude,
            longitude: record.longitude,
            weather: record.weather.into(),
            inventory: record.inventory.into(),
            crops: record.crops.into(),
            overall_status: record.overall_status,
            analytics_last_updated: record.analytics_last_updated,
        }
    }
}

/// Request body for `PUT /farms/{farm_id}/analytics/status`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    /// New overall status, e.g. `"needs attention"`.
    pub status: String,
}

/// Response body for `GET /farms/{farm_id}/weather`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentWeatherResponse {
    /// Farm identifier.
    pub farm_id: String,
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
    /// When the snapshot was fetched from the provider.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl CurrentWeatherResponse {
    /// Builds the response for `farm_id` from a fetched snapshot.
    #[must_use]
    pub fn new(farm_id: String, snapshot: WeatherSnapshot) -> Self {
        Self {
            farm_id,
            temp_celsius: snapshot.temp_celsius,
            humidity: snapshot.humidity,
            description: snapshot.description,
            icon: snapshot.icon,
            wind_speed: snapshot.wind_speed,
            rain_1h: snapshot.rain_1h,
            observed_at: snapshot.observed_at,
            fetched_at: snapshot.fetched_at,
        }
    }
}
