//! Sqlite-backed record store
//!
//! Upserts are keyed by (partition key, row key) so redelivered work items
//! overwrite rather than duplicate. Bulk mailbox writes are chunked at 100
//! records per transaction.

use crate::error::{MigrationError, Result};
use crate::storage::types::{Environment, Mailbox, MigrationBatch};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Maximum number of records per physical batch write
const BATCH_WRITE_CHUNK: usize = 100;

/// Record store for environments, mailboxes and migration batches
#[derive(Debug, Clone)]
pub struct RecordStore {
    db: SqlitePool,
}

impl RecordStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Initialize the record tables
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS environments (
                customer_id TEXT NOT NULL,
                environment_id TEXT NOT NULL,
                name TEXT NOT NULL,
                organization TEXT NOT NULL,
                endpoint TEXT NOT NULL,
                username TEXT NOT NULL,
                password_secret TEXT NOT NULL,
                PRIMARY KEY (customer_id, environment_id)
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mailboxes (
                environment_id TEXT NOT NULL,
                mailbox_id TEXT NOT NULL,
                display_name TEXT NOT NULL,
                name TEXT NOT NULL,
                sam_account_name TEXT NOT NULL,
                user_principal_name TEXT NOT NULL,
                primary_smtp_address TEXT NOT NULL,
                migration_batch_id TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (environment_id, mailbox_id)
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_mailboxes_batch ON mailboxes(migration_batch_id)",
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS migration_batches (
                environment_id TEXT NOT NULL,
                batch_id TEXT NOT NULL,
                customer_id TEXT NOT NULL,
                name TEXT NOT NULL,
                start_time TEXT NOT NULL,
                started BOOLEAN NOT NULL DEFAULT 0,
                target_delivery_domain TEXT NOT NULL,
                PRIMARY KEY (environment_id, batch_id)
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_batches_started ON migration_batches(started, start_time)",
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Insert or replace an environment record
    pub async fn upsert_environment(&self, environment: &Environment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO environments (
                customer_id, environment_id, name, organization,
                endpoint, username, password_secret
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&environment.customer_id)
        .bind(&environment.environment_id)
        .bind(&environment.name)
        .bind(&environment.organization)
        .bind(&environment.endpoint)
        .bind(&environment.username)
        .bind(&environment.password_secret)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Get an environment by (customer id, environment id)
    pub async fn get_environment(
        &self,
        customer_id: &str,
        environment_id: &str,
    ) -> Result<Option<Environment>> {
        let row = sqlx::query_as::<_, (String, String, String, String, String, String, String)>(
            r#"
            SELECT customer_id, environment_id, name, organization,
                   endpoint, username, password_secret
            FROM environments
            WHERE customer_id = ? AND environment_id = ?
            "#,
        )
        .bind(customer_id)
        .bind(environment_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(
            |(customer_id, environment_id, name, organization, endpoint, username, password_secret)| {
                Environment {
                    customer_id,
                    environment_id,
                    name,
                    organization,
                    endpoint,
                    username,
                    password_secret,
                }
            },
        ))
    }

    /// Delete an environment and every mailbox discovered from it
    pub async fn delete_environment(&self, environment: &Environment) -> Result<()> {
        info!(
            "Deleting environment {} and its mailboxes",
            environment.environment_id
        );

        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM mailboxes WHERE environment_id = ?")
            .bind(&environment.environment_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM environments WHERE customer_id = ? AND environment_id = ?")
            .bind(&environment.customer_id)
            .bind(&environment.environment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Insert or replace a single mailbox record
    pub async fn upsert_mailbox(&self, mailbox: &Mailbox) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO mailboxes (
                environment_id, mailbox_id, display_name, name,
                sam_account_name, user_principal_name,
                primary_smtp_address, migration_batch_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&mailbox.environment_id)
        .bind(&mailbox.mailbox_id)
        .bind(&mailbox.display_name)
        .bind(&mailbox.name)
        .bind(&mailbox.sam_account_name)
        .bind(&mailbox.user_principal_name)
        .bind(&mailbox.primary_smtp_address)
        .bind(&mailbox.migration_batch_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Insert or replace mailboxes in chunks of [`BATCH_WRITE_CHUNK`]
    pub async fn upsert_mailboxes(&self, mailboxes: &[Mailbox]) -> Result<()> {
        for chunk in mailboxes.chunks(BATCH_WRITE_CHUNK) {
            let mut tx = self.db.begin().await?;

            for mailbox in chunk {
                sqlx::query(
                    r#"
                    INSERT OR REPLACE INTO mailboxes (
                        environment_id, mailbox_id, display_name, name,
                        sam_account_name, user_principal_name,
                        primary_smtp_address, migration_batch_id
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&mailbox.environment_id)
                .bind(&mailbox.mailbox_id)
                .bind(&mailbox.display_name)
                .bind(&mailbox.name)
                .bind(&mailbox.sam_account_name)
                .bind(&mailbox.user_principal_name)
                .bind(&mailbox.primary_smtp_address)
                .bind(&mailbox.migration_batch_id)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
        }

        debug!("Wrote {} mailbox records", mailboxes.len());
        Ok(())
    }

    /// Mailboxes of an environment assigned to the given batch
    pub async fn assigned_mailboxes(
        &self,
        environment_id: &str,
        batch_id: &str,
    ) -> Result<Vec<Mailbox>> {
        let rows = self
            .mailbox_query(
                r#"
                SELECT environment_id, mailbox_id, display_name, name,
                       sam_account_name, user_principal_name,
                       primary_smtp_address, migration_batch_id
                FROM mailboxes
                WHERE environment_id = ? AND migration_batch_id = ?
                ORDER BY mailbox_id ASC
                "#,
                &[environment_id, batch_id],
            )
            .await?;

        Ok(rows)
    }

    /// Mailboxes of an environment that are not assigned to any batch
    pub async fn unassigned_mailboxes(&self, environment_id: &str) -> Result<Vec<Mailbox>> {
        let rows = self
            .mailbox_query(
                r#"
                SELECT environment_id, mailbox_id, display_name, name,
                       sam_account_name, user_principal_name,
                       primary_smtp_address, migration_batch_id
                FROM mailboxes
                WHERE environment_id = ? AND migration_batch_id = ''
                ORDER BY mailbox_id ASC
                "#,
                &[environment_id],
            )
            .await?;

        Ok(rows)
    }

    /// Return mailboxes assigned to the given batch to the unassigned pool.
    /// Assignments are cleared, the mailbox rows themselves are kept.
    pub async fn clear_batch_assignments(&self, batch_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE mailboxes SET migration_batch_id = '' WHERE migration_batch_id = ?",
        )
        .bind(batch_id)
        .execute(&self.db)
        .await?;

        debug!(
            "Cleared batch {} from {} mailboxes",
            batch_id,
            result.rows_affected()
        );
        Ok(())
    }

    /// Insert or replace a migration batch record
    pub async fn upsert_batch(&self, batch: &MigrationBatch) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO migration_batches (
                environment_id, batch_id, customer_id, name,
                start_time, started, target_delivery_domain
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&batch.environment_id)
        .bind(&batch.batch_id)
        .bind(&batch.customer_id)
        .bind(&batch.name)
        .bind(batch.start_time.to_rfc3339())
        .bind(batch.started)
        .bind(&batch.target_delivery_domain)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Get a migration batch by (environment id, batch id)
    pub async fn get_batch(
        &self,
        environment_id: &str,
        batch_id: &str,
    ) -> Result<Option<MigrationBatch>> {
        let row = sqlx::query_as::<_, (String, String, String, String, String, bool, String)>(
            r#"
            SELECT environment_id, batch_id, customer_id, name,
                   start_time, started, target_delivery_domain
            FROM migration_batches
            WHERE environment_id = ? AND batch_id = ?
            "#,
        )
        .bind(environment_id)
        .bind(batch_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Self::row_to_batch).transpose()
    }

    /// Flip the started flag. The flag is monotonic: it is only ever set,
    /// never reset.
    pub async fn mark_batch_started(&self, environment_id: &str, batch_id: &str) -> Result<()> {
        info!("Marking batch {} as started", batch_id);

        sqlx::query(
            "UPDATE migration_batches SET started = 1 WHERE environment_id = ? AND batch_id = ?",
        )
        .bind(environment_id)
        .bind(batch_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Delete a migration batch record
    pub async fn delete_batch(&self, environment_id: &str, batch_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM migration_batches WHERE environment_id = ? AND batch_id = ?")
            .bind(environment_id)
            .bind(batch_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Batches that have not started and whose scheduled start time falls in
    /// the half-open interval `(now - window, now]`
    pub async fn batches_due(&self, now: DateTime<Utc>, window_secs: i64) -> Result<Vec<MigrationBatch>> {
        let lower = now - Duration::seconds(window_secs);

        let rows = sqlx::query_as::<_, (String, String, String, String, String, bool, String)>(
            r#"
            SELECT environment_id, batch_id, customer_id, name,
                   start_time, started, target_delivery_domain
            FROM migration_batches
            WHERE started = 0 AND start_time > ? AND start_time <= ?
            ORDER BY start_time ASC
            "#,
        )
        .bind(lower.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Self::row_to_batch).collect()
    }

    async fn mailbox_query(&self, sql: &str, binds: &[&str]) -> Result<Vec<Mailbox>> {
        let mut query = sqlx::query_as::<
            _,
            (String, String, String, String, String, String, String, String),
        >(sql);
        for bind in binds {
            query = query.bind(*bind);
        }

        let rows = query.fetch_all(&self.db).await?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    environment_id,
                    mailbox_id,
                    display_name,
                    name,
                    sam_account_name,
                    user_principal_name,
                    primary_smtp_address,
                    migration_batch_id,
                )| Mailbox {
                    environment_id,
                    mailbox_id,
                    display_name,
                    name,
                    sam_account_name,
                    user_principal_name,
                    primary_smtp_address,
                    migration_batch_id,
                },
            )
            .collect())
    }

    fn row_to_batch(
        row: (String, String, String, String, String, bool, String),
    ) -> Result<MigrationBatch> {
        let (environment_id, batch_id, customer_id, name, start_time, started, target) = row;

        Ok(MigrationBatch {
            environment_id,
            batch_id,
            customer_id,
            name,
            start_time: DateTime::parse_from_rfc3339(&start_time)
                .map_err(|e| MigrationError::Storage(e.to_string()))?
                .with_timezone(&Utc),
            started,
            target_delivery_domain: target,
        })
    }
}
