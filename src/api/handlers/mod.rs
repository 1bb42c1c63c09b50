//! REST endpoint handlers organized by resource.

pub mod analytics;
pub mod events;
pub mod system;

use axum::Router;

use crate::app_state::AppState;
use crate::domain::FarmId;
use crate::error::AnalyticsError;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(analytics::routes())
        .merge(events::routes())
}

/// Parses a farm id path segment.
fn parse_farm_id(raw: &str) -> Result<FarmId, AnalyticsError> {
    FarmId::parse(raw)
        .ok_or_else(|| AnalyticsError::InvalidRequest("farm_id must not be blank".to_string()))
}
