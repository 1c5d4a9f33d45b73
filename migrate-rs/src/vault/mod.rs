//! Secret vault
//!
//! Stores credential material referenced by identifier. Records elsewhere in
//! storage carry the identifier only, never the secret value itself.

use crate::error::Result;
use sqlx::SqlitePool;
use tracing::debug;

/// Secret store keyed by opaque identifier
#[derive(Debug, Clone)]
pub struct SecretVault {
    db: SqlitePool,
}

impl SecretVault {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Initialize the secrets table
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS secrets (
                identifier TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Get a secret by identifier, `None` when absent
    pub async fn get(&self, identifier: &str) -> Result<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>("SELECT value FROM secrets WHERE identifier = ?")
            .bind(identifier)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Store a secret, replacing any existing value
    pub async fn store(&self, identifier: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO secrets (identifier, value) VALUES (?, ?)")
            .bind(identifier)
            .bind(value)
            .execute(&self.db)
            .await?;

        debug!("Stored secret {}", identifier);
        Ok(())
    }

    /// Delete a secret. Deleting an absent identifier is not an error.
    pub async fn delete(&self, identifier: &str) -> Result<()> {
        sqlx::query("DELETE FROM secrets WHERE identifier = ?")
            .bind(identifier)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}
