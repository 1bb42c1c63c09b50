//! Event ingress: write paths hand domain events to the notifier over HTTP.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{PublishEventsRequest, PublishEventsResponse};
use crate::app_state::AppState;
use crate::domain::Event;
use crate::error::{AnalyticsError, ErrorResponse};

/// `POST /events`: Queue domain events for publishing on the bus.
///
/// The whole request is validated before anything is queued. Events are
/// queued in request order and published asynchronously.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidRequest`] for an empty batch or an
/// unknown event type, and [`AnalyticsError::Unavailable`] when the
/// notification queue refuses an event.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Publish events",
    description = "Accepts one event envelope or an array of them and queues each for publishing on the event bus.",
    request_body = PublishEventsRequest,
    responses(
        (status = 202, description = "Events queued", body = PublishEventsResponse),
        (status = 400, description = "Empty batch or unknown event type", body = ErrorResponse),
        (status = 503, description = "Notification queue full", body = ErrorResponse),
    )
)]
pub async fn publish_events(
    State(state): State<AppState>,
    Json(req): Json<PublishEventsRequest>,
) -> Result<impl IntoResponse, AnalyticsError> {
    let events = req
        .into_vec()
        .into_iter()
        .map(Event::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    if events.is_empty() {
        return Err(AnalyticsError::InvalidRequest(
            "at least one event is required".to_string(),
        ));
    }

    let total = events.len();
    let mut ids = Vec::with_capacity(total);
    for event in events {
        let id = event.id.clone();
        if !state.notifier.notify(event) {
            return Err(AnalyticsError::Unavailable(format!(
                "queued {} of {total} events, notification queue is full or closed",
                ids.len()
            )));
        }
        ids.push(id);
    }

    tracing::debug!(accepted = total, "events queued from ingress");
    Ok((
        StatusCode::ACCEPTED,
        Json(PublishEventsResponse {
            accepted: total,
            ids,
        }),
    ))
}

/// Event ingress routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events", post(publish_events))
}
