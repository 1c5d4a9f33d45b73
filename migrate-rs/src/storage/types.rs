//! Record types persisted by the migration worker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A source mail environment registered for migration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    /// Owning customer (partition key)
    pub customer_id: String,
    /// Environment identifier (row key)
    pub environment_id: String,
    /// Display name, also used as the migration endpoint name
    pub name: String,
    /// Exchange Online organization the environment migrates into
    pub organization: String,
    /// Remote shell endpoint of the source environment
    pub endpoint: String,
    /// Account used to connect to the source environment
    pub username: String,
    /// Vault identifier of the account password, never the secret itself
    pub password_secret: String,
}

/// A discovered or assigned mailbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mailbox {
    /// Owning environment (partition key)
    pub environment_id: String,
    /// Mailbox guid (row key)
    pub mailbox_id: String,
    pub display_name: String,
    pub name: String,
    pub sam_account_name: String,
    pub user_principal_name: String,
    pub primary_smtp_address: String,
    /// Assigned batch id; empty string means the unassigned pool
    pub migration_batch_id: String,
}

/// A scheduled group of mailboxes to move to the target system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationBatch {
    /// Owning environment (partition key)
    pub environment_id: String,
    /// Batch identifier (row key)
    pub batch_id: String,
    /// Owning customer, used to resolve the environment record
    pub customer_id: String,
    /// Batch name, the remote identity for start/delete operations
    pub name: String,
    /// Scheduled start time
    pub start_time: DateTime<Utc>,
    /// Monotonic flag, flipped true once the remote start succeeds
    pub started: bool,
    /// Target delivery domain for moved mailboxes
    pub target_delivery_domain: String,
}

impl Mailbox {
    /// True when the mailbox belongs to the unassigned pool
    pub fn is_unassigned(&self) -> bool {
        self.migration_batch_id.is_empty()
    }
}
