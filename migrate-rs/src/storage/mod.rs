//! Persistent records for environments, mailboxes and migration batches
//!
//! Three logical tables keyed by (partition key, row key):
//! - `environments`: partition = customer id, row = environment id
//! - `mailboxes`: partition = environment id, row = mailbox guid
//! - `migration_batches`: partition = environment id, row = batch id

pub mod store;
pub mod types;

pub use store::RecordStore;
pub use types::{Environment, Mailbox, MigrationBatch};
