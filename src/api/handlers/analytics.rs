//! Farm analytics handlers: read-model lookup, status update, current
//! weather.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};

use super::parse_farm_id;
use crate::api::dto::{CurrentWeatherResponse, FarmAnalyticsResponse, UpdateStatusRequest};
use crate::app_state::AppState;
use crate::error::{AnalyticsError, ErrorResponse};

/// `GET /farms/{farm_id}/analytics`: Get the analytics record of a farm.
///
/// # Errors
///
/// Returns [`AnalyticsError::FarmNotFound`] if the projection holds no
/// record for the farm.
#[utoipa::path(
    get,
    path = "/api/v1/farms/{farm_id}/analytics",
    tag = "Analytics",
    summary = "Get farm analytics",
    description = "Returns the denormalized analytics record maintained by the event projection.",
    params(
        ("farm_id" = String, Path, description = "Farm identifier"),
    ),
    responses(
        (status = 200, description = "Analytics record", body = FarmAnalyticsResponse),
        (status = 400, description = "Invalid farm id", body = ErrorResponse),
        (status = 404, description = "No record for the farm", body = ErrorResponse),
    )
)]
pub async fn get_analytics(
    State(state): State<AppState>,
    Path(farm_id): Path<String>,
) -> Result<impl IntoResponse, AnalyticsError> {
    let farm_id = parse_farm_id(&farm_id)?;
    let record = state.service.get_analytics(&farm_id).await?;
    Ok(Json(FarmAnalyticsResponse::from(record)))
}

/// `PUT /farms/{farm_id}/analytics/status`: Set the overall status.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidRequest`] for a blank status and
/// [`AnalyticsError::FarmNotFound`] for an unknown farm.
#[utoipa::path(
    put,
    path = "/api/v1/farms/{farm_id}/analytics/status",
    tag = "Analytics",
    summary = "Set overall status",
    description = "Stores an operator-provided overall status on the analytics record and returns the updated record.",
    params(
        ("farm_id" = String, Path, description = "Farm identifier"),
    ),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated analytics record", body = FarmAnalyticsResponse),
        (status = 400, description = "Invalid status", body = ErrorResponse),
        (status = 404, description = "No record for the farm", body = ErrorResponse),
    )
)]
pub async fn update_status(
    State(state): State<AppState>,
    Path(farm_id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, AnalyticsError> {
    let farm_id = parse_farm_id(&farm_id)?;
    let record = state
        .service
        .set_overall_status(&farm_id, &req.status)
        .await?;
    Ok(Json(FarmAnalyticsResponse::from(record)))
}

/// `GET /farms/{farm_id}/weather`: Current weather at the farm.
///
/// # Errors
///
/// Returns [`AnalyticsError::FarmNotFound`] for an unknown farm,
/// [`AnalyticsError::InvalidRequest`] if it has no location, and
/// [`AnalyticsError::WeatherFetch`] if the provider fails.
#[utoipa::path(
    get,
    path = "/api/v1/farms/{farm_id}/weather",
    tag = "Analytics",
    summary = "Get current weather",
    description = "Fetches current weather for the farm's stored coordinates through the shared cached fetcher.",
    params(
        ("farm_id" = String, Path, description = "Farm identifier"),
    ),
    responses(
        (status = 200, description = "Current weather", body = CurrentWeatherResponse),
        (status = 400, description = "Farm has no location", body = ErrorResponse),
        (status = 404, description = "No record for the farm", body = ErrorResponse),
        (status = 502, description = "Weather provider failed", body = ErrorResponse),
    )
)]
pub async fn get_weather(
    State(state): State<AppState>,
    Path(farm_id): Path<String>,
) -> Result<impl IntoResponse, AnalyticsError> {
    let farm_id = parse_farm_id(&farm_id)?;
    let snapshot = state.service.current_weather(&farm_id).await?;
    Ok(Json(CurrentWeatherResponse::new(farm_id.into(), snapshot)))
}

/// Farm analytics routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/farms/{farm_id}/analytics", get(get_analytics))
        .route("/farms/{farm_id}/analytics/status", put(update_status))
        .route("/farms/{farm_id}/weather", get(get_weather))
}
