use migrate_rs::config::Config;
use migrate_rs::orchestrator::MigrationOrchestrator;
use migrate_rs::queue::WorkQueue;
use migrate_rs::remote::HttpRemoteShell;
use migrate_rs::scheduler::BatchScheduler;
use migrate_rs::storage::RecordStore;
use migrate_rs::telemetry::Telemetry;
use migrate_rs::vault::SecretVault;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = if std::path::Path::new("config.toml").exists() {
        Config::from_file("config.toml")?
    } else {
        Config::default()
    };

    // Initialize logging
    let level = Level::from_str(&config.logging.level).unwrap_or(Level::INFO);
    if config.logging.format == "json" {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .pretty()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("Starting migrate-rs worker");
    info!("  Database: {}", config.storage.database_url);
    info!("  Exchange endpoint: {}", config.service.exchange_endpoint);
    info!(
        "  Scheduler tick: {}s, lookback: {}s",
        config.scheduler.tick_interval_secs, config.scheduler.lookback_secs
    );

    // Connect storage and initialize tables
    let options =
        SqliteConnectOptions::from_str(&config.storage.database_url)?.create_if_missing(true);
    let db = SqlitePool::connect_with(options).await?;

    let telemetry = Telemetry::new();
    let store = RecordStore::new(db.clone());
    let vault = SecretVault::new(db.clone());
    let queue = Arc::new(WorkQueue::new(
        db.clone(),
        config.queue.clone(),
        telemetry.clone(),
    ));

    store.init_db().await?;
    vault.init_db().await?;
    queue.init_db().await?;

    let shell = Arc::new(HttpRemoteShell::new(
        Duration::from_secs(config.remote.timeout_secs),
        telemetry.clone(),
    ));

    let orchestrator = Arc::new(MigrationOrchestrator::new(
        store.clone(),
        vault,
        shell,
        config.service.clone(),
        telemetry,
    ));

    // Start the queue worker in a separate task
    let worker_queue = Arc::clone(&queue);
    let worker_handle = tokio::spawn(async move {
        worker_queue.run_worker(orchestrator).await;
    });

    // Start the batch scheduler in a separate task
    let scheduler = BatchScheduler::new(
        store,
        Arc::clone(&queue),
        Duration::from_secs(config.scheduler.tick_interval_secs),
        config.scheduler.lookback_secs,
    );
    let scheduler_handle = tokio::spawn(scheduler.run());

    // Wait for either task to exit (or panic)
    tokio::select! {
        result = worker_handle => {
            match result {
                Ok(()) => info!("Queue worker exited"),
                Err(e) => error!("Queue worker panic: {}", e),
            }
        }
        result = scheduler_handle => {
            match result {
                Ok(()) => info!("Scheduler exited"),
                Err(e) => error!("Scheduler panic: {}", e),
            }
        }
    }

    Ok(())
}
