//! Decoding of bus envelopes into the closed set of projection inputs.
//!
//! Producers are free to invent new event types and payload shapes; the
//! projection only accepts the ten types it subscribes to, each decoded
//! into one typed arm of [`ProjectionEvent`].

use serde::Deserialize;

use crate::domain::{Event, EventType, FarmId, FarmProfile, WeatherSnapshot};

/// Payload names a farm id may travel under.
const FARM_ID_FIELDS: &[&str] = &["farm_id", "farmId"];

/// Payload names an owning user id may travel under.
const OWNER_ID_FIELDS: &[&str] = &["user_id", "userId"];

/// Why an envelope could not be turned into a [`ProjectionEvent`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The type is not one the projection handles.
    #[error("unhandled event type '{0}'")]
    UnknownType(String),

    /// Neither the envelope nor the payload names a farm.
    #[error("{0} event carries no farm id")]
    MissingFarmId(EventType),

    /// The payload does not have the shape the type requires.
    #[error("malformed {event_type} payload: {source}")]
    MalformedPayload {
        /// Type whose payload failed to decode.
        event_type: EventType,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Which farms an inventory change affects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryTarget {
    /// The payload named the farm directly.
    Farm(FarmId),
    /// Only the owning user is known; every farm they own is affected.
    Owner(String),
}

/// A bus event the analytics projection knows how to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionEvent {
    /// `farm.created` / `farm.updated`.
    FarmUpserted(FarmProfile),
    /// `farm.deleted`.
    FarmDeleted {
        /// Farm to remove.
        farm_id: FarmId,
    },
    /// `weather.updated`.
    WeatherUpdated {
        /// Farm the weather belongs to.
        farm_id: FarmId,
        /// Fetched conditions.
        snapshot: WeatherSnapshot,
    },
    /// `cropland.created` / `cropland.updated` / `cropland.deleted`.
    CroplandChanged {
        /// Farm whose crop section needs a recount.
        farm_id: FarmId,
    },
    /// `inventory.item.created` / `.updated` / `.deleted`.
    InventoryChanged {
        /// Farms whose inventory section needs a recount.
        target: InventoryTarget,
    },
}

/// Identity fields of a `farm.*` payload.
///
/// Accepts the snake_case names and the camelCase ones written by the
/// farm repository (`uuid`, `ownerId`, `farmType`, `totalSize`).
#[derive(Debug, Deserialize)]
struct FarmPayload {
    #[serde(default, alias = "uuid", alias = "farmId")]
    farm_id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default, alias = "ownerId")]
    owner_id: String,
    #[serde(default, alias = "farmType")]
    farm_type: Option<String>,
    #[serde(default, alias = "totalSize")]
    total_size: Option<String>,
    #[serde(default, alias = "latitude")]
    lat: f64,
    #[serde(default, alias = "longitude")]
    lon: f64,
}

impl ProjectionEvent {
    /// Decodes an envelope.
    ///
    /// Farm-level types take their farm from `aggregate_id`, falling back
    /// to a payload `farm_id`. Cropland and inventory types only trust the
    /// payload, since their `aggregate_id` is the child entity's own id.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for unknown types, events with no
    /// resolvable farm, and payloads of the wrong shape. None of these can
    /// be fixed by redelivery.
    pub fn decode(event: &Event) -> Result<Self, DecodeError> {
        let event_type = EventType::parse(&event.event_type)
            .ok_or_else(|| DecodeError::UnknownType(event.event_type.clone()))?;

        match event_type {
            EventType::FarmCreated | EventType::FarmUpdated => {
                let payload: FarmPayload = from_payload(event, event_type)?;
                let farm_id = FarmId::parse(&event.aggregate_id)
                    .or_else(|| payload.farm_id.as_deref().and_then(FarmId::parse))
                    .ok_or(DecodeError::MissingFarmId(event_type))?;
                Ok(Self::FarmUpserted(FarmProfile {
                    farm_id,
                    name: payload.name,
                    owner_id: payload.owner_id,
                    farm_type: payload.farm_type.filter(|s| !s.trim().is_empty()),
                    total_size: payload.total_size.filter(|s| !s.trim().is_empty()),
                    latitude: payload.lat,
                    longitude: payload.lon,
                }))
            }
            EventType::FarmDeleted => Ok(Self::FarmDeleted {
                farm_id: envelope_farm(event, event_type)?,
            }),
            EventType::WeatherUpdated => {
                let farm_id = envelope_farm(event, event_type)?;
                let snapshot = from_payload(event, event_type)?;
                Ok(Self::WeatherUpdated { farm_id, snapshot })
            }
            EventType::CroplandCreated | EventType::CroplandUpdated | EventType::CroplandDeleted => {
                let farm_id = payload_field(event, FARM_ID_FIELDS)
                    .and_then(FarmId::parse)
                    .ok_or(DecodeError::MissingFarmId(event_type))?;
                Ok(Self::CroplandChanged { farm_id })
            }
            EventType::InventoryItemCreated
            | EventType::InventoryItemUpdated
            | EventType::InventoryItemDeleted => {
                let target = if let Some(farm_id) =
                    payload_field(event, FARM_ID_FIELDS).and_then(FarmId::parse)
                {
                    InventoryTarget::Farm(farm_id)
                } else if let Some(owner) = payload_field(event, OWNER_ID_FIELDS) {
                    InventoryTarget::Owner(owner.to_string())
                } else {
                    return Err(DecodeError::MissingFarmId(event_type));
                };
                Ok(Self::InventoryChanged { target })
            }
        }
    }

    /// Short name of the arm, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::FarmUpserted(_) => "farm_upserted",
            Self::FarmDeleted { .. } => "farm_deleted",
            Self::WeatherUpdated { .. } => "weather_updated",
            Self::CroplandChanged { .. } => "cropland_changed",
            Self::InventoryChanged { .. } => "inventory_changed",
        }
    }
}

/// Farm id from `aggregate_id`, else from the payload.
fn envelope_farm(event: &Event, event_type: EventType) -> Result<FarmId, DecodeError> {
    FarmId::parse(&event.aggregate_id)
        .or_else(|| payload_field(event, FARM_ID_FIELDS).and_then(FarmId::parse))
        .ok_or(DecodeError::MissingFarmId(event_type))
}

fn payload_field<'a>(event: &'a Event, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| event.payload_str(name))
}

fn from_payload<T: serde::de::DeserializeOwned>(
    event: &Event,
    event_type: EventType,
) -> Result<T, DecodeError> {
    T::deserialize(&event.payload)
        .map_err(|source| DecodeError::MalformedPayload { event_type, source })
}
