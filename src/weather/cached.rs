//! Caching decorator around a [`WeatherFetcher`].

use std::sync::Arc;

use async_trait::async_trait;

use super::WeatherFetcher;
use crate::cache::{Cache, Ttl};
use crate::domain::WeatherSnapshot;
use crate::error::AnalyticsError;

/// Returns the cache key for a coordinate pair.
///
/// Coordinates are rounded to four decimals (about 11 m), so nearby farms
/// share one provider call.
#[must_use]
pub fn cache_key(latitude: f64, longitude: f64) -> String {
    format!("weather_coords_{latitude:.4}_{longitude:.4}")
}

/// Serves repeat lookups from a cache and only stores successes.
#[derive(Debug, Clone)]
pub struct CachedWeatherFetcher {
    inner: Arc<dyn WeatherFetcher>,
    cache: Arc<dyn Cache<WeatherSnapshot>>,
}

impl CachedWeatherFetcher {
    /// Wraps `inner`; entries use the cache's default TTL.
    #[must_use]
    pub fn new(inner: Arc<dyn WeatherFetcher>, cache: Arc<dyn Cache<WeatherSnapshot>>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl WeatherFetcher for CachedWeatherFetcher {
    async fn current_weather(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherSnapshot, AnalyticsError> {
        let key = cache_key(latitude, longitude);
        if let Some(snapshot) = self.cache.get(&key) {
            tracing::debug!(%key, "weather cache hit");
            return Ok(snapshot);
        }

        tracing::debug!(%key, "weather cache miss");
        let snapshot = self.inner.current_weather(latitude, longitude).await?;
        self.cache.set(&key, snapshot.clone(), Ttl::Default);
        Ok(snapshot)
    }
}
