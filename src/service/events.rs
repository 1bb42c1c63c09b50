//! Builders for the events that write paths publish after committing.
//!
//! Each builder produces the envelope and payload shape the analytics
//! projection decodes. Hand the result to
//! [`crate::bus::EventNotifier::notify`] so the write never waits on the
//! bus.

use serde_json::json;

use crate::domain::{Cropland, Event, EventType, FarmId, FarmProfile, InventoryItem};
use crate::error::AnalyticsError;

/// `source` of farm events.
pub const FARM_SOURCE: &str = "farm-repository";
/// `source` of cropland events.
pub const CROPLAND_SOURCE: &str = "cropland-repository";
/// `source` of inventory events.
pub const INVENTORY_SOURCE: &str = "inventory-repository";

/// `farm.created` or `farm.updated`, keyed on the farm.
///
/// # Errors
///
/// Returns [`AnalyticsError::Serialization`] if the profile cannot be
/// encoded.
pub fn farm_saved(profile: &FarmProfile, created: bool) -> Result<Event, AnalyticsError> {
    let event_type = if created {
        EventType::FarmCreated
    } else {
        EventType::FarmUpdated
    };
    Ok(Event::new(
        event_type.as_str(),
        FARM_SOURCE,
        profile.farm_id.as_str(),
        serde_json::to_value(profile)?,
    ))
}

/// `farm.deleted`, keyed on the farm.
#[must_use]
pub fn farm_deleted(farm_id: &FarmId) -> Event {
    Event::new(
        EventType::FarmDeleted.as_str(),
        FARM_SOURCE,
        farm_id.as_str(),
        json!({ "farm_id": farm_id }),
    )
}

/// `cropland.created` or `cropland.updated`, keyed on the cropland. The
/// payload carries the owning `farm_id`.
///
/// # Errors
///
/// Returns [`AnalyticsError::Serialization`] if the cropland cannot be
/// encoded.
pub fn cropland_saved(cropland: &Cropland, created: bool) -> Result<Event, AnalyticsError> {
    let event_type = if created {
        EventType::CroplandCreated
    } else {
        EventType::CroplandUpdated
    };
    Ok(Event::new(
        event_type.as_str(),
        CROPLAND_SOURCE,
        cropland.id.as_str(),
        serde_json::to_value(cropland)?,
    ))
}

/// `cropland.deleted`, keyed on the cropland.
#[must_use]
pub fn cropland_deleted(cropland_id: &str, farm_id: &FarmId) -> Event {
    Event::new(
        EventType::CroplandDeleted.as_str(),
        CROPLAND_SOURCE,
        cropland_id,
        json!({ "id": cropland_id, "farm_id": farm_id }),
    )
}

/// `inventory.item.created` or `inventory.item.updated`, keyed on the
/// item. Inventory belongs to a user, so the payload names the owner
/// rather than a farm.
///
/// # Errors
///
/// Returns [`AnalyticsError::Serialization`] if the item cannot be
/// encoded.
pub fn inventory_item_saved(item: &InventoryItem, created: bool) -> Result<Event, AnalyticsError> {
    let event_type = if created {
        EventType::InventoryItemCreated
    } else {
        EventType::InventoryItemUpdated
    };
    Ok(Event::new(
        event_type.as_str(),
        INVENTORY_SOURCE,
        item.id.as_str(),
        serde_json::to_value(item)?,
    ))
}

/// `inventory.item.deleted`, keyed on the item.
#[must_use]
pub fn inventory_item_deleted(item_id: &str, user_id: &str) -> Event {
    Event::new(
        EventType::InventoryItemDeleted.as_str(),
        INVENTORY_SOURCE,
        item_id,
        json!({ "id": item_id, "user_id": user_id }),
    )
}
