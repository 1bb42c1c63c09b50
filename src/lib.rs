//! # farm-analytics
//!
//! Event-driven read-model for farm analytics.
//!
//! Write paths hand domain events (`farm.*`, `cropland.*`,
//! `inventory.item.*`) to `POST /api/v1/events`, which queues them on the
//! [`bus::EventNotifier`] for publishing onto a topic-routed event bus. A
//! projection consumes them and keeps one denormalized [`domain::FarmAnalytics`]
//! record per farm. A background worker periodically fetches current
//! weather for every located farm through a TTL-cached fetcher and
//! publishes `weather.updated` events, which the same projection folds
//! into the record's weather section.
//!
//! ## Architecture
//!
//! ```text
//! POST /api/v1/events ─EventNotifier┐
//!                                   │
//! WeatherUpdater (worker/) ─────────┼──► EventBus (bus/) ──► FarmAnalyticsProjection (projection/)
//!   │                               │                                 │
//!   └── CachedWeatherFetcher ◄──────┼── AnalyticsService (service/)   ▼
//!         (weather/, cache/)        │           ▲            AnalyticsRepository (persistence/)
//!                                   │           │              ├── PostgresStore
//!                                   │   REST handlers (api/)   └── MemoryStore
//! ```

pub mod api;
pub mod app_state;
pub mod bus;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod projection;
pub mod service;
pub mod weather;
pub mod worker;
