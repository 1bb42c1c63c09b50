//! Current-weather lookup by coordinates.
//!
//! [`WeatherFetcher`] is the seam between the core and the external
//! provider. [`OpenWeatherMapFetcher`] talks to the provider over HTTP and
//! [`CachedWeatherFetcher`] wraps any fetcher with a TTL cache keyed by
//! rounded coordinates.

pub mod cached;
pub mod openweathermap;

use async_trait::async_trait;

pub use cached::CachedWeatherFetcher;
pub use openweathermap::OpenWeatherMapFetcher;

use crate::domain::WeatherSnapshot;
use crate::error::AnalyticsError;

/// Looks up current weather for a coordinate pair.
#[async_trait]
pub trait WeatherFetcher: Send + Sync + std::fmt::Debug {
    /// Returns the current weather at (`latitude`, `longitude`).
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::WeatherFetch`] if the provider fails or
    /// answers with unusable data.
    async fn current_weather(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherSnapshot, AnalyticsError>;
}
