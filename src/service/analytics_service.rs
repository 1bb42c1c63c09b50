//! Read-side service over the analytics store and the shared weather
//! fetcher.

use std::sync::Arc;

use crate::domain::{FarmAnalytics, FarmId, WeatherSnapshot, entities::has_coordinates};
use crate::error::AnalyticsError;
use crate::persistence::AnalyticsRepository;
use crate::weather::WeatherFetcher;

/// Longest accepted overall status, in characters.
const MAX_STATUS_LEN: usize = 255;

/// Queries and operator updates on the farm analytics read-model.
///
/// The weather fetcher is the same cached instance the refresh worker
/// uses, so on-demand lookups share its cache.
#[derive(Debug, Clone)]
pub struct AnalyticsService {
    repository: Arc<dyn AnalyticsRepository>,
    fetcher: Arc<dyn WeatherFetcher>,
}

impl AnalyticsService {
    /// Creates a new `AnalyticsService`.
    #[must_use]
    pub fn new(
        repository: Arc<dyn AnalyticsRepository>,
        fetcher: Arc<dyn WeatherFetcher>,
    ) -> Self {
        Self {
            repository,
            fetcher,
        }
    }

    /// Returns the analytics record for a farm.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::FarmNotFound`] if the projection has no
    /// record for the farm.
    pub async fn get_analytics(&self, farm_id: &FarmId) -> Result<FarmAnalytics, AnalyticsError> {
        self.repository.get_farm_analytics(farm_id).await
    }

    /// Sets the overall status and returns the updated record.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::InvalidRequest`] for a blank or oversized
    /// status and [`AnalyticsError::FarmNotFound`] for an unknown farm.
    pub async fn set_overall_status(
        &self,
        farm_id: &FarmId,
        status: &str,
    ) -> Result<FarmAnalytics, AnalyticsError> {
        let status = status.trim();
        if status.is_empty() {
            return Err(AnalyticsError::InvalidRequest(
                "status must not be empty".to_string(),
            ));
        }
        if status.chars().count() > MAX_STATUS_LEN {
            return Err(AnalyticsError::InvalidRequest(format!(
                "status must be at most {MAX_STATUS_LEN} characters"
            )));
        }

        self.repository.update_overall_status(farm_id, status).await?;
        tracing::info!(%farm_id, status, "overall status updated");
        self.repository.get_farm_analytics(farm_id).await
    }

    /// Fetches current weather for a farm at its stored coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::FarmNotFound`] for an unknown farm,
    /// [`AnalyticsError::InvalidRequest`] if the farm has no location, and
    /// [`AnalyticsError::WeatherFetch`] if the provider fails.
    pub async fn current_weather(
        &self,
        farm_id: &FarmId,
    ) -> Result<WeatherSnapshot, AnalyticsError> {
        let record = self.repository.get_farm_analytics(farm_id).await?;
        if !has_coordinates(record.latitude, record.longitude) {
            return Err(AnalyticsError::InvalidRequest(format!(
                "farm {farm_id} has no location configured"
            )));
        }
        self.fetcher
            .current_weather(record.latitude, record.longitude)
            .await
    }
}
