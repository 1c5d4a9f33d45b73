//! Connection descriptors and credential resolution
//!
//! Resolution dereferences the secret identifier stored on a record into an
//! actual credential pair and validates the stored endpoint URI. No retries
//! happen at this layer; callers decide what a failure means.

use crate::config::ServiceConfig;
use crate::error::{MigrationError, Result};
use crate::storage::Environment;
use crate::vault::SecretVault;
use url::Url;

/// A resolved credential pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Everything needed to open a remote shell session
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub endpoint: Url,
    /// Shell schema launched when the connection is established
    pub schema_uri: String,
    pub credential: Credential,
}

/// Build the Exchange Online connection descriptor for an organization.
/// The organization is appended to the endpoint base as the delegated org.
pub async fn resolve_online(
    service: &ServiceConfig,
    vault: &SecretVault,
    organization: &str,
) -> Result<ConnectionInfo> {
    let password = vault
        .get(&service.admin_password_secret)
        .await?
        .ok_or_else(|| {
            MigrationError::CredentialResolution(format!(
                "secret '{}' is absent from the vault",
                service.admin_password_secret
            ))
        })?;

    let raw = format!("{}{}", service.exchange_endpoint, organization);
    let endpoint = Url::parse(&raw).map_err(|e| {
        MigrationError::InvalidEndpoint(format!("'{}' is not a well-formed URI: {}", raw, e))
    })?;

    Ok(ConnectionInfo {
        endpoint,
        schema_uri: service.schema_uri.clone(),
        credential: Credential {
            username: service.admin_username.clone(),
            password,
        },
    })
}

/// Build the connection descriptor for a source environment from its stored
/// endpoint and credential reference.
pub async fn resolve_on_premises(
    environment: &Environment,
    vault: &SecretVault,
    schema_uri: &str,
) -> Result<ConnectionInfo> {
    let password = vault
        .get(&environment.password_secret)
        .await?
        .ok_or_else(|| {
            MigrationError::CredentialResolution(format!(
                "secret '{}' for environment {} is absent from the vault",
                environment.password_secret, environment.environment_id
            ))
        })?;

    let endpoint = Url::parse(&environment.endpoint).map_err(|e| {
        MigrationError::InvalidEndpoint(format!(
            "environment {} endpoint '{}' is not a well-formed URI: {}",
            environment.environment_id, environment.endpoint, e
        ))
    })?;

    Ok(ConnectionInfo {
        endpoint,
        schema_uri: schema_uri.to_string(),
        credential: Credential {
            username: environment.username.clone(),
            password,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_redacts_password() {
        let credential = Credential {
            username: "admin@contoso.com".to_string(),
            password: "hunter2".to_string(),
        };

        let printed = format!("{:?}", credential);
        assert!(printed.contains("admin@contoso.com"));
        assert!(!printed.contains("hunter2"));
    }
}
