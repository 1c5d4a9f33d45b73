//! Batch scheduler
//!
//! Polls the batch table on a configurable interval and emits a start work
//! item for every batch whose scheduled start time has arrived and that has
//! not been marked started. A batch may be re-emitted on consecutive ticks
//! until the start is persisted; the orchestrator's start guard makes that
//! redelivery harmless.

use crate::error::Result;
use crate::orchestrator::WorkItem;
use crate::queue::WorkQueue;
use crate::storage::RecordStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Emits start work items for due migration batches
pub struct BatchScheduler {
    store: RecordStore,
    queue: Arc<WorkQueue>,
    tick_interval: Duration,
    lookback_secs: i64,
}

impl BatchScheduler {
    pub fn new(
        store: RecordStore,
        queue: Arc<WorkQueue>,
        tick_interval: Duration,
        lookback_secs: i64,
    ) -> Self {
        Self {
            store,
            queue,
            tick_interval,
            lookback_secs,
        }
    }

    /// Scan for due batches and enqueue a start item for each
    ///
    /// # Returns
    /// Number of start items emitted
    pub async fn tick(&self) -> Result<usize> {
        let now = Utc::now();
        let due = self.store.batches_due(now, self.lookback_secs).await?;
        let count = due.len();

        for batch in due {
            debug!("Batch {} is due, queuing start", batch.batch_id);
            self.queue
                .enqueue(&WorkItem::BatchStartRequested(batch))
                .await?;
        }

        if count > 0 {
            info!("Queued {} batch starts", count);
        }

        Ok(count)
    }

    /// Scheduler loop: tick on the configured interval
    pub async fn run(self) {
        info!(
            "Starting batch scheduler, tick every {}s",
            self.tick_interval.as_secs()
        );

        let mut interval = tokio::time::interval(self.tick_interval);

        loop {
            interval.tick().await;

            if let Err(e) = self.tick().await {
                error!("Scheduler tick failed: {}", e);
            }
        }
    }
}
