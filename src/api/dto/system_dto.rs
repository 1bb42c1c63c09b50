//! DTOs for the system endpoints.

use serde::Serialize;
use utoipa::ToSchema;

use crate::bus::{BusStatsSnapshot, NotifierStatsSnapshot};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `"healthy"`, or `"degraded"` once the bus has been closed.
    pub status: String,
    /// Current server time (RFC 3339).
    pub timestamp: String,
    /// Crate version.
    pub version: String,
    /// Live subscription queues on the bus.
    pub queues: usize,
    /// Bus delivery counters.
    pub bus: BusStatsSnapshot,
    /// Write-path notifier counters.
    pub notifier: NotifierStatsSnapshot,
}
