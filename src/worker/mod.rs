//! Background workers.
//!
//! [`WeatherUpdater`] periodically refreshes the weather of every located
//! farm and publishes one `weather.updated` event per successful fetch.

pub mod weather_updater;

pub use weather_updater::{
    PassSummary, WORKER_SOURCE, WeatherUpdater, WeatherUpdaterOptions, WorkerState,
};
