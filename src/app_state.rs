//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::bus::{EventNotifier, InMemoryEventBus};
use crate::service::AnalyticsService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Read-side service over the analytics store.
    pub service: Arc<AnalyticsService>,
    /// Event bus, exposed for health counters.
    pub bus: InMemoryEventBus,
    /// Write-path notifier fed by the event ingress endpoint.
    pub notifier: EventNotifier,
}
