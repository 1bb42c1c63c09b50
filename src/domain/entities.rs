//! Primary entities the projection reads from but does not own.
//!
//! Farms, croplands and inventory items are persisted by the CRUD side of
//! the system. The core only needs the handful of fields that drive the
//! analytics sections.

use serde::{Deserialize, Serialize};

use super::FarmId;

/// A farm and the coordinates used to fetch its weather.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmLocation {
    /// Farm identifier.
    pub farm_id: FarmId,
    /// Display name.
    pub name: String,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl FarmLocation {
    /// A farm sitting exactly at (0, 0) has no location configured.
    #[must_use]
    pub fn has_coordinates(&self) -> bool {
        has_coordinates(self.latitude, self.longitude)
    }
}

/// Returns `false` for the (0, 0) "not configured" sentinel.
#[must_use]
pub fn has_coordinates(latitude: f64, longitude: f64) -> bool {
    latitude != 0.0 || longitude != 0.0
}

/// A cropland belonging to a farm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cropland {
    /// Cropland identifier.
    pub id: String,
    /// Owning farm.
    pub farm_id: FarmId,
    /// Display name.
    pub name: String,
    /// Free-text status, e.g. `"growing"` or `"planned"`.
    pub status: String,
}

impl Cropland {
    /// Status compares case-insensitively against `"growing"`.
    #[must_use]
    pub fn is_growing(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("growing")
    }
}

/// Stock level of an inventory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryStatus {
    /// Enough stock.
    #[serde(rename = "In Stock")]
    InStock,
    /// Running low.
    #[serde(rename = "Low Stock")]
    LowStock,
    /// Nothing left.
    #[serde(rename = "Out of Stock")]
    OutOfStock,
}

impl InventoryStatus {
    /// Returns the label stored in the inventory table.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::InStock => "In Stock",
            Self::LowStock => "Low Stock",
            Self::OutOfStock => "Out of Stock",
        }
    }
}

/// An inventory item. Inventory is owned by a user, not by a farm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Item identifier.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Quantity on hand.
    pub quantity: f64,
    /// Stock level.
    pub status: InventoryStatus,
}
