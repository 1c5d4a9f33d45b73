//! Telemetry sink for operational events
//!
//! Events and exceptions are emitted as structured tracing records. Emission
//! is fire-and-forget: it never blocks and never fails the calling operation.

use crate::error::MigrationError;
use tracing::{error, info};

/// Fire-and-forget telemetry sink
#[derive(Debug, Clone, Default)]
pub struct Telemetry;

impl Telemetry {
    pub fn new() -> Self {
        Self
    }

    /// Track a named event with string properties and numeric metrics
    pub fn track_event(&self, name: &str, properties: &[(&str, &str)], metrics: &[(&str, f64)]) {
        info!(
            target: "telemetry",
            event = name,
            properties = ?properties,
            metrics = ?metrics,
            "tracked event"
        );
    }

    /// Track an error that surfaced during an operation
    pub fn track_exception(&self, err: &MigrationError) {
        error!(target: "telemetry", error = %err, "tracked exception");
    }
}
