use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub scheduler: SchedulerConfig,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Base URI for the Exchange Online remote shell endpoint. The target
    /// organization is appended as the delegated-org value.
    pub exchange_endpoint: String,
    /// Shell schema launched when a remote connection is established
    pub schema_uri: String,
    /// Administrative account used for Exchange Online operations
    pub admin_username: String,
    /// Vault identifier of the administrative account password
    pub admin_password_secret: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Number of work items fetched per poll
    pub batch_size: i64,
    /// Delivery attempts before an item is dead-lettered
    pub max_attempts: i64,
    /// Base delay before a failed item becomes visible again
    pub retry_delay_secs: i64,
    /// Sleep after a poll that processed work
    pub busy_interval_secs: u64,
    /// Sleep after a poll that found nothing
    pub idle_interval_secs: u64,
    /// Sleep after a poll that failed outright
    pub error_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Seconds between scheduler ticks
    pub tick_interval_secs: u64,
    /// Lookback window for due batches, in seconds
    pub lookback_secs: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    /// Upper bound for a remote pipeline invocation
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::MigrationError::Config(e.to_string()))?;

        toml::from_str(&content).map_err(|e| crate::error::MigrationError::Config(e.to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                exchange_endpoint: "https://ps.outlook.com/powershell-liveid?DelegatedOrg="
                    .to_string(),
                schema_uri: "http://schemas.microsoft.com/powershell/Microsoft.Exchange"
                    .to_string(),
                admin_username: "admin@contoso.onmicrosoft.com".to_string(),
                admin_password_secret: "exchange-online-admin".to_string(),
            },
            storage: StorageConfig {
                database_url: "sqlite://migrate.db".to_string(),
            },
            queue: QueueConfig {
                batch_size: 10,
                max_attempts: 3,
                retry_delay_secs: 120,
                busy_interval_secs: 5,
                idle_interval_secs: 30,
                error_interval_secs: 60,
            },
            scheduler: SchedulerConfig {
                tick_interval_secs: 3600,
                lookback_secs: 3600,
            },
            remote: RemoteConfig { timeout_secs: 300 },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.queue.max_attempts, 3);
        assert_eq!(config.scheduler.tick_interval_secs, 3600);
        assert!(config.service.exchange_endpoint.ends_with("DelegatedOrg="));
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
            [service]
            exchange_endpoint = "https://ps.outlook.com/powershell-liveid?DelegatedOrg="
            schema_uri = "http://schemas.microsoft.com/powershell/Microsoft.Exchange"
            admin_username = "admin@fabrikam.onmicrosoft.com"
            admin_password_secret = "admin-secret"

            [storage]
            database_url = "sqlite::memory:"

            [queue]
            batch_size = 5
            max_attempts = 3
            retry_delay_secs = 60
            busy_interval_secs = 1
            idle_interval_secs = 10
            error_interval_secs = 30

            [scheduler]
            tick_interval_secs = 900
            lookback_secs = 3600

            [remote]
            timeout_secs = 120

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scheduler.tick_interval_secs, 900);
        assert_eq!(config.queue.batch_size, 5);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::default();
        std::fs::write(&path, toml::to_string(&config).unwrap()).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.service.admin_username, config.service.admin_username);
        assert_eq!(loaded.queue.retry_delay_secs, config.queue.retry_delay_secs);

        assert!(Config::from_file(dir.path().join("absent.toml")).is_err());
    }
}
