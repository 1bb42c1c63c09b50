//! Weather snapshot value object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current weather for one location.
///
/// Every field is optional because providers may omit any of them. Field
/// names are snake_case on the wire; the camelCase names emitted by older
/// workers (`tempCelsius`, `rainVolume1h`, ...) are accepted on decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Air temperature in °C.
    #[serde(default, alias = "tempCelsius", skip_serializing_if = "Option::is_none")]
    pub temp_celsius: Option<f64>,
    /// Relative humidity in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    /// Short textual description, e.g. `"light rain"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Provider icon code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Wind speed in m/s.
    #[serde(default, alias = "windSpeed", skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    /// Rain volume over the last hour in mm.
    #[serde(default, alias = "rainVolume1h", skip_serializing_if = "Option::is_none")]
    pub rain_1h: Option<f64>,
    /// When the provider observed these values.
    #[serde(default, alias = "observedAt", skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
    /// When this snapshot was fetched from the provider.
    #[serde(default, alias = "weatherLastUpdated", skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}
