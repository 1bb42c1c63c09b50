//! OpenWeatherMap One Call 3.0 client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;

use super::WeatherFetcher;
use crate::domain::WeatherSnapshot;
use crate::error::AnalyticsError;

/// Default One Call endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/3.0/onecall";

/// Sections of the One Call response we never read.
const EXCLUDED_SECTIONS: &str = "minutely,hourly,daily,alerts";

#[derive(Debug, Deserialize)]
struct OneCallResponse {
    current: Option<Current>,
}

#[derive(Debug, Deserialize)]
struct Current {
    #[serde(default)]
    dt: Option<i64>,
    #[serde(default)]
    temp: Option<f64>,
    #[serde(default)]
    humidity: Option<f64>,
    #[serde(default)]
    wind_speed: Option<f64>,
    #[serde(default)]
    rain: Option<Precipitation>,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct Precipitation {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
    icon: String,
}

/// [`WeatherFetcher`] backed by the OpenWeatherMap HTTP API.
///
/// Requests metric units, so temperatures come back in °C and wind speed
/// in m/s.
#[derive(Debug, Clone)]
pub struct OpenWeatherMapFetcher {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl OpenWeatherMapFetcher {
    /// Creates a fetcher for `base_url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Configuration`] if the URL does not parse
    /// or the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, AnalyticsError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            AnalyticsError::Configuration(format!("invalid weather base url '{base_url}': {e}"))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalyticsError::Configuration(format!("weather http client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    fn request_url(&self, latitude: f64, longitude: f64) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("lat", &format!("{latitude:.4}"))
            .append_pair("lon", &format!("{longitude:.4}"))
            .append_pair("appid", &self.api_key)
            .append_pair("units", "metric")
            .append_pair("exclude", EXCLUDED_SECTIONS);
        url
    }
}

#[async_trait]
impl WeatherFetcher for OpenWeatherMapFetcher {
    async fn current_weather(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherSnapshot, AnalyticsError> {
        let url = self.request_url(latitude, longitude);
        tracing::debug!(latitude, longitude, "fetching weather from provider");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                latitude,
                longitude,
                status = status.as_u16(),
                %body,
                "weather provider returned non-success status"
            );
            return Err(AnalyticsError::WeatherFetch(format!(
                "provider responded with {status}"
            )));
        }

        let body: OneCallResponse = response.json().await?;
        let snapshot = into_snapshot(body, Utc::now())?;
        tracing::debug!(
            latitude,
            longitude,
            temp_celsius = ?snapshot.temp_celsius,
            description = ?snapshot.description,
            "weather fetched"
        );
        Ok(snapshot)
    }
}

fn into_snapshot(
    body: OneCallResponse,
    fetched_at: DateTime<Utc>,
) -> Result<WeatherSnapshot, AnalyticsError> {
    let current = body.current.ok_or_else(|| {
        AnalyticsError::WeatherFetch("response has no current weather".to_string())
    })?;
    let condition = current.weather.into_iter().next().ok_or_else(|| {
        AnalyticsError::WeatherFetch("response has no weather description".to_string())
    })?;

    Ok(WeatherSnapshot {
        temp_celsius: current.temp,
        humidity: current.humidity,
        description: Some(condition.description),
        icon: Some(condition.icon),
        wind_speed: current.wind_speed,
        rain_1h: current.rain.and_then(|r| r.one_hour),
        observed_at: current.dt.and_then(|dt| DateTime::from_timestamp(dt, 0)),
        fetched_at: Some(fetched_at),
    })
}
