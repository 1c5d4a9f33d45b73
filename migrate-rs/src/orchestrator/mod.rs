//! Migration workflow orchestration
//!
//! - [`types`]: the work items consumed from the queue
//! - [`manager`]: the orchestrator that executes them

pub mod manager;
pub mod types;

pub use manager::MigrationOrchestrator;
pub use types::WorkItem;
