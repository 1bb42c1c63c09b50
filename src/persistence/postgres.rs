//! PostgreSQL implementation of the read-model store.
//!
//! Concurrency is left to the database: every write is a single statement
//! keyed on `farm_id`, and section timestamps are advanced with
//! `GREATEST` so concurrent handlers cannot move them backwards.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::{ANALYTICS_COLUMNS, FarmAnalyticsRow, FarmLocationRow};
use super::{AnalyticsRepository, FarmDirectory};
use crate::domain::{
    CropSection, FarmAnalytics, FarmId, FarmLocation, FarmProfile, InventorySection,
    WeatherSnapshot,
};
use crate::error::AnalyticsError;

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Persistence`] if the database is
    /// unreachable within `connect_timeout`.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        min_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, AnalyticsError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(connect_timeout)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), AnalyticsError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AnalyticsError::Persistence(format!("migration failed: {e}")))
    }
}

#[async_trait]
impl AnalyticsRepository for PostgresStore {
    async fn get_farm_analytics(&self, farm_id: &FarmId) -> Result<FarmAnalytics, AnalyticsError> {
        let query = format!("SELECT {ANALYTICS_COLUMNS} FROM farm_analytics WHERE farm_id = $1");
        let row = sqlx::query_as::<_, FarmAnalyticsRow>(&query)
            .bind(farm_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => FarmAnalytics::try_from(row),
            None => Err(AnalyticsError::FarmNotFound(farm_id.to_string())),
        }
    }

    async fn upsert_farm_base(&self, profile: &FarmProfile) -> Result<(), AnalyticsError> {
        sqlx::query(
            "INSERT INTO farm_analytics \
                 (farm_id, farm_name, owner_id, farm_type, total_size, latitude, longitude, \
                  analytics_last_updated) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (farm_id) DO UPDATE SET \
                 farm_name = EXCLUDED.farm_name, \
                 owner_id = EXCLUDED.owner_id, \
                 farm_type = EXCLUDED.farm_type, \
                 total_size = EXCLUDED.total_size, \
                 latitude = EXCLUDED.latitude, \
                 longitude = EXCLUDED.longitude, \
                 analytics_last_updated = \
                     GREATEST(farm_analytics.analytics_last_updated, EXCLUDED.analytics_last_updated)",
        )
        .bind(profile.farm_id.as_str())
        .bind(&profile.name)
        .bind(&profile.owner_id)
        .bind(profile.farm_type.as_deref())
        .bind(profile.total_size.as_deref())
        .bind(profile.latitude)
        .bind(profile.longitude)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_weather(
        &self,
        farm_id: &FarmId,
        snapshot: &WeatherSnapshot,
    ) -> Result<bool, AnalyticsError> {
        let result = sqlx::query(
            "UPDATE farm_analytics SET \
                 weather_temp_celsius = $2, \
                 weather_humidity = $3, \
                 weather_description = $4, \
                 weather_icon = $5, \
                 weather_wind_speed = $6, \
                 weather_rain_1h = $7, \
                 weather_observed_at = $8, \
                 weather_last_updated = GREATEST(weather_last_updated, $9), \
                 analytics_last_updated = GREATEST(analytics_last_updated, $9) \
             WHERE farm_id = $1",
        )
        .bind(farm_id.as_str())
        .bind(snapshot.temp_celsius)
        .bind(snapshot.humidity)
        .bind(snapshot.description.as_deref())
        .bind(snapshot.icon.as_deref())
        .bind(snapshot.wind_speed)
        .bind(snapshot.rain_1h)
        .bind(snapshot.observed_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn recompute_crop_stats(&self, farm_id: &FarmId) -> Result<CropSection, AnalyticsError> {
        let (total_count, growing_count, last_updated) =
            sqlx::query_as::<_, (i64, i64, Option<chrono::DateTime<Utc>>)>(
                "INSERT INTO farm_analytics \
                     (farm_id, farm_name, owner_id, latitude, longitude, \
                      crop_total_count, crop_growing_count, crop_last_updated, \
                      analytics_last_updated) \
                 SELECT $1, '', '', 0, 0, \
                        COUNT(*), \
                        COUNT(*) FILTER (WHERE lower(status) = 'growing'), \
                        $2, $2 \
                 FROM croplands WHERE farm_id::text = $1 \
                 ON CONFLICT (farm_id) DO UPDATE SET \
                     crop_total_count = EXCLUDED.crop_total_count, \
                     crop_growing_count = EXCLUDED.crop_growing_count, \
                     crop_last_updated = \
                         GREATEST(farm_analytics.crop_last_updated, EXCLUDED.crop_last_updated), \
                     analytics_last_updated = \
                         GREATEST(farm_analytics.analytics_last_updated, EXCLUDED.analytics_last_updated) \
                 RETURNING crop_total_count, crop_growing_count, crop_last_updated",
            )
            .bind(farm_id.as_str())
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Ok(CropSection {
            total_count,
            growing_count,
            last_updated,
        })
    }

    async fn recompute_inventory_stats(
        &self,
        farm_id: &FarmId,
    ) -> Result<Option<InventorySection>, AnalyticsError> {
        let row = sqlx::query_as::<_, (i64, i64, Option<chrono::DateTime<Utc>>)>(
            "UPDATE farm_analytics fa SET \
                 inventory_total_items = counts.total, \
                 inventory_low_stock_count = counts.low, \
                 inventory_last_updated = GREATEST(fa.inventory_last_updated, $2), \
                 analytics_last_updated = GREATEST(fa.analytics_last_updated, $2) \
             FROM ( \
                 SELECT COUNT(i.id) AS total, \
                        COUNT(i.id) FILTER (WHERE lower(s.name) = 'low stock') AS low \
                 FROM farm_analytics owner_row \
                 LEFT JOIN inventory_items i ON i.user_id::text = owner_row.owner_id \
                 LEFT JOIN inventory_status s ON s.id = i.status_id \
                 WHERE owner_row.farm_id = $1 \
             ) counts \
             WHERE fa.farm_id = $1 \
             RETURNING fa.inventory_total_items, fa.inventory_low_stock_count, \
                       fa.inventory_last_updated",
        )
        .bind(farm_id.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(
            row.map(|(total_items, low_stock_count, last_updated)| InventorySection {
                total_items,
                low_stock_count,
                last_updated,
            }),
        )
    }

    async fn delete_farm_analytics(&self, farm_id: &FarmId) -> Result<bool, AnalyticsError> {
        let result = sqlx::query("DELETE FROM farm_analytics WHERE farm_id = $1")
            .bind(farm_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_overall_status(
        &self,
        farm_id: &FarmId,
        status: &str,
    ) -> Result<(), AnalyticsError> {
        let result = sqlx::query(
            "UPDATE farm_analytics SET \
                 overall_status = $2, \
                 analytics_last_updated = GREATEST(analytics_last_updated, $3) \
             WHERE farm_id = $1",
        )
        .bind(farm_id.as_str())
        .bind(status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AnalyticsError::FarmNotFound(farm_id.to_string()));
        }
        Ok(())
    }

    async fn farm_ids_for_owner(&self, owner_id: &str) -> Result<Vec<FarmId>, AnalyticsError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT farm_id FROM farm_analytics WHERE owner_id = $1 ORDER BY farm_id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.iter().filter_map(|id| FarmId::parse(id)).collect())
    }
}

#[async_trait]
impl FarmDirectory for PostgresStore {
    async fn list_farms_with_location(&self) -> Result<Vec<FarmLocation>, AnalyticsError> {
        let rows = sqlx::query_as::<_, FarmLocationRow>(
            "SELECT uuid::text AS uuid, name, lat, lon FROM farms \
             WHERE lat <> 0 OR lon <> 0 \
             ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(FarmLocationRow::into_location)
            .collect())
    }
}
