//! Data Transfer Objects for REST request/response serialization.
//!
//! Responses are flat JSON views of the read-model; domain types never
//! cross the HTTP boundary directly. Ingested events arrive as
//! [`PublishEventRequest`] and become envelopes only after validation.

pub mod analytics_dto;
pub mod events_dto;
pub mod system_dto;

pub use analytics_dto::*;
pub use events_dto::*;
pub use system_dto::*;
