//! Projection of bus events into the farm analytics read-model.
//!
//! [`ProjectionEvent`] is the typed view of the ten event types the
//! projection consumes; [`FarmAnalyticsProjection`] subscribes to them and
//! applies each one to an [`crate::persistence::AnalyticsRepository`].

pub mod decode;
pub mod engine;

pub use decode::{DecodeError, InventoryTarget, ProjectionEvent};
pub use engine::FarmAnalyticsProjection;
