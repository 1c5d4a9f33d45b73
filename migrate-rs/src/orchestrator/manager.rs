//! Migration orchestrator
//!
//! Executes one work item at a time: resolve the records and credentials the
//! item needs, run the remote commands, persist the outcome. Failures
//! propagate to the queue runtime, which owns redelivery; no retry or
//! backoff happens here. Remote operations against a single organization are
//! serialized through a per-organization lock because the remote shell
//! endpoint does not tolerate concurrent sessions for one tenant.

use crate::config::ServiceConfig;
use crate::error::{MigrationError, Result};
use crate::orchestrator::types::WorkItem;
use crate::remote::command::{csv_payload, RemoteCommand};
use crate::remote::connection::{resolve_on_premises, resolve_online};
use crate::remote::session::{RemoteShell, ShellRecord};
use crate::storage::{Environment, Mailbox, MigrationBatch, RecordStore};
use crate::telemetry::Telemetry;
use crate::vault::SecretVault;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Remote batch statuses that mean the batch is already underway. A start
/// request observing one of these persists the local flag without issuing
/// another start command.
const REMOTE_STARTED_STATUSES: &[&str] =
    &["Starting", "Syncing", "Synced", "Completing", "Completed"];

/// Executes migration work items
pub struct MigrationOrchestrator {
    store: RecordStore,
    vault: SecretVault,
    shell: Arc<dyn RemoteShell>,
    service: ServiceConfig,
    telemetry: Telemetry,
    org_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MigrationOrchestrator {
    pub fn new(
        store: RecordStore,
        vault: SecretVault,
        shell: Arc<dyn RemoteShell>,
        service: ServiceConfig,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            store,
            vault,
            shell,
            service,
            telemetry,
            org_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Execute a single work item. Either the expected state mutation happens
    /// or a taxonomy error is raised; there is no silent no-op path.
    pub async fn handle(&self, item: WorkItem) -> Result<()> {
        info!("Handling {} work item", item.kind());

        match item {
            WorkItem::EnvironmentDiscovered(environment) => {
                self.discover_environment(&environment).await
            }
            WorkItem::BatchCreated(batch) => self.create_batch(&batch).await,
            WorkItem::BatchStartRequested(batch) => self.start_batch(&batch).await,
            WorkItem::BatchDeleteRequested(batch) => self.delete_batch(&batch).await,
        }
    }

    /// Enumerate the environment's mailboxes, create its migration endpoint
    /// and persist the discovered mailboxes into the unassigned pool.
    async fn discover_environment(&self, environment: &Environment) -> Result<()> {
        let on_premises =
            resolve_on_premises(environment, &self.vault, &self.service.schema_uri).await?;
        let source_credential = on_premises.credential.clone();

        let lock = self.org_lock(&environment.organization).await;
        let _guard = lock.lock().await;

        let records = self
            .shell
            .invoke(&on_premises, &[RemoteCommand::GetMailboxes])
            .await?;

        let mailboxes = records
            .iter()
            .map(|record| mailbox_from_record(environment, record))
            .collect::<Result<Vec<Mailbox>>>()?;

        let online = resolve_online(&self.service, &self.vault, &environment.organization).await?;
        self.shell
            .invoke(
                &online,
                &[RemoteCommand::NewMigrationEndpoint {
                    credential: source_credential,
                    email_address: environment.username.clone(),
                    name: environment.name.clone(),
                }],
            )
            .await?;

        self.store.upsert_mailboxes(&mailboxes).await?;

        info!(
            "Discovered {} mailboxes for environment {}",
            mailboxes.len(),
            environment.environment_id
        );
        Ok(())
    }

    /// Create the remote migration batch from the mailboxes assigned to it.
    /// The batch record already exists; nothing is mutated locally.
    async fn create_batch(&self, batch: &MigrationBatch) -> Result<()> {
        let environment = self.owning_environment(batch).await?;
        let online = resolve_online(&self.service, &self.vault, &environment.organization).await?;

        let members = self
            .store
            .assigned_mailboxes(&environment.environment_id, &batch.batch_id)
            .await?;

        let lock = self.org_lock(&environment.organization).await;
        let _guard = lock.lock().await;

        self.shell
            .invoke(
                &online,
                &[RemoteCommand::NewMigrationBatch {
                    csv_data: csv_payload(&members),
                    name: batch.name.clone(),
                    source_endpoint: environment.name.clone(),
                    target_delivery_domain: batch.target_delivery_domain.clone(),
                }],
            )
            .await?;

        info!(
            "Created remote batch {} with {} mailboxes",
            batch.name,
            members.len()
        );
        Ok(())
    }

    /// Start the remote migration batch and persist the started flag.
    ///
    /// Start is check-then-act so redelivery is safe: a batch already marked
    /// started locally is a success without any remote call, and a batch the
    /// remote side reports as underway only gets its local flag persisted.
    /// The start command is never issued twice for one batch.
    async fn start_batch(&self, batch: &MigrationBatch) -> Result<()> {
        let current = self
            .store
            .get_batch(&batch.environment_id, &batch.batch_id)
            .await?
            .ok_or_else(|| {
                MigrationError::NotFound(format!("migration batch {}", batch.batch_id))
            })?;

        if current.started {
            info!("Batch {} is already started, nothing to do", current.name);
            return Ok(());
        }

        let environment = self.owning_environment(&current).await?;
        let online = resolve_online(&self.service, &self.vault, &environment.organization).await?;

        let lock = self.org_lock(&environment.organization).await;
        let _guard = lock.lock().await;

        let status = self
            .shell
            .invoke(
                &online,
                &[RemoteCommand::GetMigrationBatch {
                    identity: current.name.clone(),
                }],
            )
            .await?;

        if remote_batch_started(&status) {
            info!(
                "Batch {} already started remotely, persisting flag only",
                current.name
            );
        } else {
            self.shell
                .invoke(
                    &online,
                    &[RemoteCommand::StartMigrationBatch {
                        identity: current.name.clone(),
                    }],
                )
                .await?;
        }

        self.store
            .mark_batch_started(&current.environment_id, &current.batch_id)
            .await?;

        info!("Batch {} started", current.name);
        Ok(())
    }

    /// Remove the remote migration batch, then return its mailboxes to the
    /// unassigned pool and delete the batch record.
    async fn delete_batch(&self, batch: &MigrationBatch) -> Result<()> {
        let current = self
            .store
            .get_batch(&batch.environment_id, &batch.batch_id)
            .await?
            .ok_or_else(|| {
                MigrationError::NotFound(format!("migration batch {}", batch.batch_id))
            })?;

        let environment = self.owning_environment(&current).await?;
        let online = resolve_online(&self.service, &self.vault, &environment.organization).await?;

        {
            let lock = self.org_lock(&environment.organization).await;
            let _guard = lock.lock().await;

            self.shell
                .invoke(
                    &online,
                    &[RemoteCommand::RemoveMigrationBatch {
                        identity: current.name.clone(),
                    }],
                )
                .await?;
        }

        self.store.clear_batch_assignments(&current.batch_id).await?;
        self.store
            .delete_batch(&current.environment_id, &current.batch_id)
            .await?;

        info!("Batch {} deleted", current.name);
        Ok(())
    }

    /// Fetch per-user statistics for a batch through a compound pipeline
    pub async fn batch_statistics(&self, batch: &MigrationBatch) -> Result<Vec<ShellRecord>> {
        let environment = self.owning_environment(batch).await?;
        let online = resolve_online(&self.service, &self.vault, &environment.organization).await?;

        let lock = self.org_lock(&environment.organization).await;
        let _guard = lock.lock().await;

        let records = self
            .shell
            .invoke(
                &online,
                &[
                    RemoteCommand::GetMigrationUsers {
                        batch_id: batch.name.clone(),
                    },
                    RemoteCommand::GetMigrationUserStatistics,
                ],
            )
            .await?;

        self.telemetry.track_event(
            "BatchStatistics",
            &[("Batch", batch.name.as_str())],
            &[("Records", records.len() as f64)],
        );

        Ok(records)
    }

    /// Resolve the environment record a batch belongs to
    async fn owning_environment(&self, batch: &MigrationBatch) -> Result<Environment> {
        self.store
            .get_environment(&batch.customer_id, &batch.environment_id)
            .await?
            .ok_or_else(|| {
                MigrationError::NotFound(format!(
                    "environment {} for batch {}",
                    batch.environment_id, batch.batch_id
                ))
            })
    }

    /// The serialization lock for one organization
    async fn org_lock(&self, organization: &str) -> Arc<Mutex<()>> {
        let mut locks = self.org_locks.lock().await;
        locks
            .entry(organization.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Map a Get-Mailbox output record into a mailbox row of the unassigned pool
fn mailbox_from_record(environment: &Environment, record: &ShellRecord) -> Result<Mailbox> {
    Ok(Mailbox {
        environment_id: environment.environment_id.clone(),
        mailbox_id: required_property(record, "Guid")?,
        display_name: required_property(record, "DisplayName")?,
        name: required_property(record, "Name")?,
        sam_account_name: required_property(record, "SamAccountName")?,
        user_principal_name: required_property(record, "UserPrincipalName")?,
        primary_smtp_address: required_property(record, "PrimarySmtpAddress")?,
        migration_batch_id: String::new(),
    })
}

fn required_property(record: &ShellRecord, name: &str) -> Result<String> {
    record
        .property(name)
        .map(str::to_string)
        .ok_or_else(|| MigrationError::remote(format!("mailbox record is missing '{}'", name)))
}

/// True when the probed remote status shows the batch is already underway
fn remote_batch_started(records: &[ShellRecord]) -> bool {
    records
        .first()
        .and_then(|record| record.property("Status"))
        .map(|status| {
            debug!("Remote batch status: {}", status);
            REMOTE_STARTED_STATUSES.contains(&status)
        })
        .unwrap_or(false)
}
