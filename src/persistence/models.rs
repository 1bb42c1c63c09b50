//! Database row models for the `farm_analytics` table.

use chrono::{DateTime, Utc};

use crate::domain::{
    CropSection, FarmAnalytics, FarmId, FarmLocation, InventorySection, WeatherSection,
};
use crate::error::AnalyticsError;

/// Column list shared by every query that returns a full record.
pub(crate) const ANALYTICS_COLUMNS: &str = "farm_id, farm_name, owner_id, farm_type, total_size, \
     latitude, longitude, weather_temp_celsius, weather_humidity, weather_description, \
     weather_icon, weather_wind_speed, weather_rain_1h, weather_observed_at, \
     weather_last_updated, inventory_total_items, inventory_low_stock_count, \
     inventory_last_updated, crop_total_count, crop_growing_count, crop_last_updated, \
     overall_status, analytics_last_updated";

/// A row of the `farm_analytics` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FarmAnalyticsRow {
    /// Primary key.
    pub farm_id: String,
    /// Display name.
    pub farm_name: String,
    /// Owning user id.
    pub owner_id: String,
    /// Optional farm type.
    pub farm_type: Option<String>,
    /// Optional free-text size.
    pub total_size: Option<String>,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Weather: temperature in °C.
    pub weather_temp_celsius: Option<f64>,
    /// Weather: humidity percent.
    pub weather_humidity: Option<f64>,
    /// Weather: description.
    pub weather_description: Option<String>,
    /// Weather: icon code.
    pub weather_icon: Option<String>,
    /// Weather: wind speed in m/s.
    pub weather_wind_speed: Option<f64>,
    /// Weather: rain over the last hour in mm.
    pub weather_rain_1h: Option<f64>,
    /// Weather: provider observation time.
    pub weather_observed_at: Option<DateTime<Utc>>,
    /// Weather section timestamp.
    pub weather_last_updated: Option<DateTime<Utc>>,
    /// Inventory: item count.
    pub inventory_total_items: i64,
    /// Inventory: low-stock item count.
    pub inventory_low_stock_count: i64,
    /// Inventory section timestamp.
    pub inventory_last_updated: Option<DateTime<Utc>>,
    /// Crops: cropland count.
    pub crop_total_count: i64,
    /// Crops: growing cropland count.
    pub crop_growing_count: i64,
    /// Crop section timestamp.
    pub crop_last_updated: Option<DateTime<Utc>>,
    /// Operator-set status.
    pub overall_status: Option<String>,
    /// Record timestamp.
    pub analytics_last_updated: DateTime<Utc>,
}

impl TryFrom<FarmAnalyticsRow> for FarmAnalytics {
    type Error = AnalyticsError;

    fn try_from(row: FarmAnalyticsRow) -> Result<Self, Self::Error> {
        let farm_id = FarmId::parse(&row.farm_id).ok_or_else(|| {
            AnalyticsError::Persistence("farm_analytics row with blank farm_id".to_string())
        })?;
        Ok(Self {
            farm_id,
            farm_name: row.farm_name,
            owner_id: row.owner_id,
            farm_type: row.farm_type,
            total_size: row.total_size,
            latitude: row.latitude,
            longitude: row.longitude,
            weather: WeatherSection {
                temp_celsius: row.weather_temp_celsius,
                humidity: row.weather_humidity,
                description: row.weather_description,
                icon: row.weather_icon,
                wind_speed: row.weather_wind_speed,
                rain_1h: row.weather_rain_1h,
                observed_at: row.weather_observed_at,
                last_updated: row.weather_last_updated,
            },
            inventory: InventorySection {
                total_items: row.inventory_total_items,
                low_stock_count: row.inventory_low_stock_count,
                last_updated: row.inventory_last_updated,
            },
            crops: CropSection {
                total_count: row.crop_total_count,
                growing_count: row.crop_growing_count,
                last_updated: row.crop_last_updated,
            },
            overall_status: row.overall_status,
            analytics_last_updated: row.analytics_last_updated,
        })
    }
}

/// A row of the primary `farms` table, reduced to what the worker needs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FarmLocationRow {
    /// Farm id.
    pub uuid: String,
    /// Display name.
    pub name: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

impl FarmLocationRow {
    /// Converts into a [`FarmLocation`]; rows with a blank id yield `None`.
    #[must_use]
    pub fn into_location(self) -> Option<FarmLocation> {
        Some(FarmLocation {
            farm_id: FarmId::parse(&self.uuid)?,
            name: self.name,
            latitude: self.lat,
            longitude: self.lon,
        })
    }
}
