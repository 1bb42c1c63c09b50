//! The event envelope shared by every producer and consumer.
//!
//! An [`Event`] is immutable once published. The bus treats `payload` as an
//! opaque JSON value; only consumers give it a shape (see
//! [`crate::projection::ProjectionEvent`]). Events are routed on the
//! `events` topic exchange under `events.<type>`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the topic exchange every event is published to.
pub const EXCHANGE_NAME: &str = "events";

/// Returns the routing key for an event type, e.g. `events.farm.created`.
#[must_use]
pub fn routing_key_for(event_type: &str) -> String {
    format!("{EXCHANGE_NAME}.{event_type}")
}

/// Canonical message envelope.
///
/// Wire format is JSON: `{id, type, source, timestamp, aggregate_id,
/// payload}`. The capitalised field names written by older producers
/// (`ID`, `Type`, `AggregateID`, ...) are accepted on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event id.
    #[serde(alias = "ID")]
    pub id: String,
    /// Event type, e.g. `weather.updated`.
    #[serde(rename = "type", alias = "Type")]
    pub event_type: String,
    /// Component that produced the event.
    #[serde(default, alias = "Source")]
    pub source: String,
    /// Moment the state change happened.
    #[serde(alias = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Entity the event is about, usually a farm or item id.
    #[serde(default, alias = "AggregateID")]
    pub aggregate_id: String,
    /// Event-type-specific body.
    #[serde(default, alias = "Payload")]
    pub payload: serde_json::Value,
}

impl Event {
    /// Creates an event with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(
        event_type: impl Into<String>,
        source: impl Into<String>,
        aggregate_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            source: source.into(),
            timestamp: Utc::now(),
            aggregate_id: aggregate_id.into(),
            payload,
        }
    }

    /// Returns the routing key this event is published under.
    #[must_use]
    pub fn routing_key(&self) -> String {
        routing_key_for(&self.event_type)
    }

    /// Returns a non-blank string field from an object payload.
    #[must_use]
    pub fn payload_str(&self, field: &str) -> Option<&str> {
        self.payload
            .get(field)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Serializes the envelope into a message body.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the payload cannot be encoded.
    pub fn to_body(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes an envelope from a message body.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the body is not a valid envelope.
    pub fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

/// The event types the analytics projection understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// A farm was created.
    FarmCreated,
    /// A farm's identity fields changed.
    FarmUpdated,
    /// A farm was deleted.
    FarmDeleted,
    /// Fresh weather was fetched for a farm.
    WeatherUpdated,
    /// A cropland was created.
    CroplandCreated,
    /// A cropland changed.
    CroplandUpdated,
    /// A cropland was deleted.
    CroplandDeleted,
    /// An inventory item was created.
    InventoryItemCreated,
    /// An inventory item changed.
    InventoryItemUpdated,
    /// An inventory item was deleted.
    InventoryItemDeleted,
}

impl EventType {
    /// Every variant, in subscription order.
    pub const ALL: [Self; 10] = [
        Self::FarmCreated,
        Self::FarmUpdated,
        Self::FarmDeleted,
        Self::WeatherUpdated,
        Self::CroplandCreated,
        Self::CroplandUpdated,
        Self::CroplandDeleted,
        Self::InventoryItemCreated,
        Self::InventoryItemUpdated,
        Self::InventoryItemDeleted,
    ];

    /// Returns the wire name, e.g. `inventory.item.created`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FarmCreated => "farm.created",
            Self::FarmUpdated => "farm.updated",
            Self::FarmDeleted => "farm.deleted",
            Self::WeatherUpdated => "weather.updated",
            Self::CroplandCreated => "cropland.created",
            Self::CroplandUpdated => "cropland.updated",
            Self::CroplandDeleted => "cropland.deleted",
            Self::InventoryItemCreated => "inventory.item.created",
            Self::InventoryItemUpdated => "inventory.item.updated",
            Self::InventoryItemDeleted => "inventory.item.deleted",
        }
    }

    /// Parses a wire name; unknown names yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == raw)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
