//! migrate-rs: Mailbox migration orchestration worker
//!
//! A background worker that orchestrates Exchange Online migration batches:
//! it consumes work items from a persistent queue, drives remote shell
//! commands against source environments and Exchange Online, and persists
//! the resulting state.
//!
//! # Features
//!
//! - **Work queue**: at-least-once delivery with bounded redelivery and
//!   dead-lettering
//! - **Remote shell**: typed commands executed in scoped sessions with
//!   deterministic release
//! - **Scheduler**: emits batch starts when scheduled start times arrive
//! - **Storage**: environments, mailboxes and migration batches in sqlite
//!
//! # Example
//!
//! ```no_run
//! use migrate_rs::config::Config;
//! use migrate_rs::orchestrator::MigrationOrchestrator;
//! use migrate_rs::remote::HttpRemoteShell;
//! use migrate_rs::storage::RecordStore;
//! use migrate_rs::telemetry::Telemetry;
//! use migrate_rs::vault::SecretVault;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let db = sqlx::SqlitePool::connect(&config.storage.database_url).await?;
//!
//!     let store = RecordStore::new(db.clone());
//!     let vault = SecretVault::new(db.clone());
//!     let shell = Arc::new(HttpRemoteShell::new(
//!         Duration::from_secs(config.remote.timeout_secs),
//!         Telemetry::new(),
//!     ));
//!
//!     let _orchestrator = MigrationOrchestrator::new(
//!         store,
//!         vault,
//!         shell,
//!         config.service.clone(),
//!         Telemetry::new(),
//!     );
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`orchestrator`]: Work item execution
//! - [`queue`]: Persistent work queue and worker loop
//! - [`remote`]: Remote shell connections, commands and execution
//! - [`scheduler`]: Due-batch polling
//! - [`storage`]: Record store for environments, mailboxes and batches
//! - [`telemetry`]: Fire-and-forget event sink
//! - [`vault`]: Secret store

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod queue;
pub mod remote;
pub mod scheduler;
pub mod storage;
pub mod telemetry;
pub mod vault;

// Re-export commonly used types
pub use config::Config;
pub use error::{MigrationError, Result};
