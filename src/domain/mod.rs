//! Domain layer: event envelope, identifiers, and the analytics read-model.
//!
//! This module contains the types shared by every other layer: the
//! [`Event`] envelope that travels on the bus, the [`FarmAnalytics`] record
//! the projection maintains, the [`WeatherSnapshot`] value object, and the
//! minimal views of farms, croplands and inventory items the core reads.

pub mod analytics;
pub mod entities;
pub mod event;
pub mod farm_id;
pub mod weather;

pub use analytics::{CropSection, FarmAnalytics, FarmProfile, InventorySection, WeatherSection};
pub use entities::{Cropland, FarmLocation, InventoryItem, InventoryStatus};
pub use event::{Event, EventType};
pub use farm_id::FarmId;
pub use weather::WeatherSnapshot;
