use chrono::{Duration, Utc};
use migrate_rs::config::QueueConfig;
use migrate_rs::orchestrator::WorkItem;
use migrate_rs::queue::WorkQueue;
use migrate_rs::scheduler::BatchScheduler;
use migrate_rs::storage::{MigrationBatch, RecordStore};
use migrate_rs::telemetry::Telemetry;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;

async fn setup() -> (RecordStore, Arc<WorkQueue>, BatchScheduler) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let store = RecordStore::new(pool.clone());
    store.init_db().await.unwrap();

    let queue = Arc::new(WorkQueue::new(
        pool,
        QueueConfig {
            batch_size: 10,
            max_attempts: 3,
            retry_delay_secs: 60,
            busy_interval_secs: 1,
            idle_interval_secs: 1,
            error_interval_secs: 1,
        },
        Telemetry::new(),
    ));
    queue.init_db().await.unwrap();

    let scheduler = BatchScheduler::new(
        store.clone(),
        Arc::clone(&queue),
        std::time::Duration::from_secs(3600),
        3600,
    );

    (store, queue, scheduler)
}

fn batch(id: &str, start_time: chrono::DateTime<Utc>, started: bool) -> MigrationBatch {
    MigrationBatch {
        environment_id: "env-1".to_string(),
        batch_id: id.to_string(),
        customer_id: "customer-1".to_string(),
        name: format!("Batch {}", id),
        start_time,
        started,
        target_delivery_domain: "contoso.mail.onmicrosoft.com".to_string(),
    }
}

#[tokio::test]
async fn test_due_batch_queues_start_item() {
    let (store, queue, scheduler) = setup().await;

    store
        .upsert_batch(&batch("due", Utc::now() - Duration::seconds(60), false))
        .await
        .unwrap();

    let emitted = scheduler.tick().await.unwrap();
    assert_eq!(emitted, 1);

    let pending = queue.next_pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    match &pending[0].item {
        WorkItem::BatchStartRequested(due) => assert_eq!(due.batch_id, "due"),
        other => panic!("unexpected work item: {}", other.kind()),
    }
}

#[tokio::test]
async fn test_started_and_future_batches_are_ignored() {
    let (store, queue, scheduler) = setup().await;

    store
        .upsert_batch(&batch("running", Utc::now() - Duration::seconds(60), true))
        .await
        .unwrap();
    store
        .upsert_batch(&batch("future", Utc::now() + Duration::seconds(600), false))
        .await
        .unwrap();

    let emitted = scheduler.tick().await.unwrap();
    assert_eq!(emitted, 0);
    assert!(queue.next_pending(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unstarted_batch_is_re_emitted_every_tick() {
    let (store, queue, scheduler) = setup().await;

    store
        .upsert_batch(&batch("due", Utc::now() - Duration::seconds(60), false))
        .await
        .unwrap();

    assert_eq!(scheduler.tick().await.unwrap(), 1);
    assert_eq!(scheduler.tick().await.unwrap(), 1);

    // Two deliveries for the same batch; the orchestrator's start guard
    // makes the second one harmless
    assert_eq!(queue.next_pending(10).await.unwrap().len(), 2);
}
