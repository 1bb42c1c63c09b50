//! Service layer: read-side orchestration and write-path event builders.
//!
//! [`AnalyticsService`] serves the analytics record, operator status
//! updates and on-demand weather. [`events`] builds the notifications the
//! CRUD write paths hand to the [`crate::bus::EventNotifier`].

pub mod analytics_service;
pub mod events;

pub use analytics_service::AnalyticsService;
