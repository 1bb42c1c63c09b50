//! DTOs for the event ingress endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Event, EventType};
use crate::error::AnalyticsError;

/// `source` stamped on ingested events that do not name one.
pub const INGRESS_SOURCE: &str = "http-ingress";

/// One domain event handed in by a write path.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishEventRequest {
    /// Event id. Generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Wire name, e.g. `farm.created`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Emitting component.
    #[serde(default)]
    pub source: Option<String>,
    /// When the event happened. Defaults to receipt time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Id of the entity the event is about.
    #[serde(default)]
    pub aggregate_id: String,
    /// Type-specific body.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

impl TryFrom<PublishEventRequest> for Event {
    type Error = AnalyticsError;

    fn try_from(req: PublishEventRequest) -> Result<Self, Self::Error> {
        let event_type = req.event_type.trim();
        if EventType::parse(event_type).is_none() {
            return Err(AnalyticsError::InvalidRequest(format!(
                "unknown event type '{event_type}'"
            )));
        }
        let source = req
            .source
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| INGRESS_SOURCE.to_string());
        let mut event = Event::new(event_type, source, req.aggregate_id, req.payload);
        if let Some(id) = req.id.filter(|id| !id.trim().is_empty()) {
            event.id = id;
        }
        if let Some(timestamp) = req.timestamp {
            event.timestamp = timestamp;
        }
        Ok(event)
    }
}

/// A single event or a batch.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum PublishEventsRequest {
    /// Several events, queued in order.
    Batch(Vec<PublishEventRequest>),
    /// One event.
    Single(PublishEventRequest),
}

impl PublishEventsRequest {
    /// Flattens the request into its events.
    #[must_use]
    pub fn into_vec(self) -> Vec<PublishEventRequest> {
        match self {
            Self::Batch(events) => events,
            Self::Single(event) => vec![event],
        }
    }
}

/// Events accepted onto the notification queue.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublishEventsResponse {
    /// Number of events queued for publishing.
    pub accepted: usize,
    /// Ids of the queued events, in request order.
    pub ids: Vec<String>,
}
