//! Persistent work queue with redelivery
//!
//! Work items are delivered at least once. A failed delivery is scheduled
//! again with exponential backoff until the configured attempt limit, after
//! which the item is dead-lettered and left for operator inspection.

use crate::config::QueueConfig;
use crate::error::Result;
use crate::orchestrator::{MigrationOrchestrator, WorkItem};
use crate::telemetry::Telemetry;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A queued work item delivery
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: String,
    pub item: WorkItem,
    /// Failed delivery attempts so far
    pub attempts: i64,
}

/// Sqlite-backed work queue
pub struct WorkQueue {
    db: SqlitePool,
    config: QueueConfig,
    telemetry: Telemetry,
}

impl WorkQueue {
    pub fn new(db: SqlitePool, config: QueueConfig, telemetry: Telemetry) -> Self {
        Self {
            db,
            config,
            telemetry,
        }
    }

    /// Initialize the queue table
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS work_items (
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at TEXT NOT NULL,
                available_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_work_items_status ON work_items(status, available_at)",
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Enqueue a work item
    ///
    /// # Returns
    /// ID of the queued item
    pub async fn enqueue(&self, item: &WorkItem) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let payload = serde_json::to_string(item)?;

        info!("Enqueuing {} work item: {}", item.kind(), id);

        sqlx::query(
            r#"
            INSERT INTO work_items (id, payload, status, attempts, created_at, available_at)
            VALUES (?, ?, 'pending', 0, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&payload)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(id)
    }

    /// Get pending deliveries that are ready for processing
    pub async fn next_pending(&self, limit: i64) -> Result<Vec<Delivery>> {
        let now = Utc::now();

        let rows = sqlx::query_as::<_, (String, String, i64)>(
            r#"
            SELECT id, payload, attempts
            FROM work_items
            WHERE status = 'pending' AND available_at <= ?
            ORDER BY created_at ASC
            LIMIT ?
            "#,
        )
        .bind(now.to_rfc3339())
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|(id, payload, attempts)| {
                Ok(Delivery {
                    id,
                    item: serde_json::from_str(&payload)?,
                    attempts,
                })
            })
            .collect()
    }

    /// Mark a delivery as completed
    pub async fn mark_completed(&self, id: &str) -> Result<()> {
        debug!("Marking work item {} as completed", id);

        sqlx::query("UPDATE work_items SET status = 'completed' WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Mark a delivery as failed and schedule redelivery, or dead-letter it
    /// once the attempt limit is reached
    pub async fn mark_failed(&self, id: &str, error_msg: &str, attempts: i64) -> Result<()> {
        if attempts + 1 >= self.config.max_attempts {
            warn!(
                "Work item {} exhausted {} attempts, dead-lettering",
                id, self.config.max_attempts
            );
            return self.dead_letter(id, error_msg).await;
        }

        let delay = self.config.retry_delay_secs * 2_i64.pow(attempts as u32);
        let available_at = Utc::now() + Duration::seconds(delay);

        info!(
            "Work item {} failed (attempt {}), redelivery at {}",
            id,
            attempts + 1,
            available_at
        );

        sqlx::query(
            r#"
            UPDATE work_items
            SET status = 'pending',
                attempts = ?,
                last_error = ?,
                available_at = ?
            WHERE id = ?
            "#,
        )
        .bind(attempts + 1)
        .bind(error_msg)
        .bind(available_at.to_rfc3339())
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Move a delivery to the dead-letter state
    async fn dead_letter(&self, id: &str, error_msg: &str) -> Result<()> {
        error!("Work item {} dead-lettered: {}", id, error_msg);

        sqlx::query("UPDATE work_items SET status = 'dead', last_error = ? WHERE id = ?")
            .bind(error_msg)
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Status and attempt count of a work item
    pub async fn delivery_state(&self, id: &str) -> Result<Option<(String, i64)>> {
        let row = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, attempts FROM work_items WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    /// Process ready deliveries once, dispatching each to the orchestrator
    pub async fn process(&self, orchestrator: &MigrationOrchestrator) -> Result<usize> {
        let deliveries = self.next_pending(self.config.batch_size).await?;
        let count = deliveries.len();

        for delivery in deliveries {
            match orchestrator.handle(delivery.item.clone()).await {
                Ok(()) => self.mark_completed(&delivery.id).await?,
                Err(e) => {
                    error!("Work item {} failed: {}", delivery.id, e);
                    self.telemetry.track_exception(&e);
                    self.mark_failed(&delivery.id, &e.to_string(), delivery.attempts)
                        .await?;
                }
            }
        }

        if count > 0 {
            info!("Processed {} work items", count);
        }

        Ok(count)
    }

    /// Worker loop: poll, dispatch, sleep
    pub async fn run_worker(self: Arc<Self>, orchestrator: Arc<MigrationOrchestrator>) {
        info!("Starting work queue worker");

        loop {
            match self.process(&orchestrator).await {
                Ok(0) => sleep(std::time::Duration::from_secs(self.config.idle_interval_secs)).await,
                Ok(_) => sleep(std::time::Duration::from_secs(self.config.busy_interval_secs)).await,
                Err(e) => {
                    error!("Queue processing error: {}", e);
                    sleep(std::time::Duration::from_secs(self.config.error_interval_secs)).await;
                }
            }
        }
    }
}
