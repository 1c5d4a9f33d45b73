//! Work items consumed by the orchestrator

use crate::storage::{Environment, MigrationBatch};
use serde::{Deserialize, Serialize};

/// A discrete unit of orchestration work
///
/// Produced by the portal layer or by the batch scheduler, consumed once per
/// delivery by the orchestrator. Delivery is at-least-once: every handler
/// must tolerate redelivery of an item it already processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkItem {
    /// A source environment was registered; discover its mailboxes and
    /// create the migration endpoint
    EnvironmentDiscovered(Environment),
    /// A migration batch record was created; create the remote batch
    BatchCreated(MigrationBatch),
    /// A batch's scheduled start time arrived
    BatchStartRequested(MigrationBatch),
    /// A batch was deleted by the owner; remove the remote batch
    BatchDeleteRequested(MigrationBatch),
}

impl WorkItem {
    /// Short name used in logs and telemetry
    pub fn kind(&self) -> &'static str {
        match self {
            WorkItem::EnvironmentDiscovered(_) => "environment_discovered",
            WorkItem::BatchCreated(_) => "batch_created",
            WorkItem::BatchStartRequested(_) => "batch_start_requested",
            WorkItem::BatchDeleteRequested(_) => "batch_delete_requested",
        }
    }
}
