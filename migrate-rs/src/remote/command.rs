//! Typed remote commands
//!
//! Each migration intent maps to one command variant carrying exactly the
//! fields that command needs, so a malformed parameter set cannot be
//! constructed. [`RemoteCommand::name`] and [`RemoteCommand::parameters`]
//! produce the wire form: a command name plus an ordered parameter set.

use crate::remote::connection::Credential;
use crate::storage::Mailbox;

/// A single command parameter
#[derive(Debug, Clone, PartialEq)]
pub struct CommandParameter {
    pub name: &'static str,
    pub value: ParameterValue,
}

/// Parameter payloads the remote shell understands
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Text(String),
    Bytes(Vec<u8>),
    Bool(bool),
    /// A flag parameter carrying no value
    Switch,
    Credential(Credential),
}

/// A remote migration command and its parameters
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCommand {
    /// Enumerate every mailbox of the connected environment
    GetMailboxes,
    /// Create the migration endpoint for a source environment
    NewMigrationEndpoint {
        credential: Credential,
        email_address: String,
        name: String,
    },
    /// Create a migration batch from a CSV of member addresses
    NewMigrationBatch {
        csv_data: Vec<u8>,
        name: String,
        source_endpoint: String,
        target_delivery_domain: String,
    },
    /// Query a batch, used to probe remote state before starting
    GetMigrationBatch { identity: String },
    StartMigrationBatch { identity: String },
    RemoveMigrationBatch { identity: String },
    /// List migration users of a batch, piped into statistics
    GetMigrationUsers { batch_id: String },
    GetMigrationUserStatistics,
}

impl RemoteCommand {
    /// The remote command name
    pub fn name(&self) -> &'static str {
        match self {
            RemoteCommand::GetMailboxes => "Get-Mailbox",
            RemoteCommand::NewMigrationEndpoint { .. } => "New-MigrationEndpoint",
            RemoteCommand::NewMigrationBatch { .. } => "New-MigrationBatch",
            RemoteCommand::GetMigrationBatch { .. } => "Get-MigrationBatch",
            RemoteCommand::StartMigrationBatch { .. } => "Start-MigrationBatch",
            RemoteCommand::RemoveMigrationBatch { .. } => "Remove-MigrationBatch",
            RemoteCommand::GetMigrationUsers { .. } => "Get-MigrationUser",
            RemoteCommand::GetMigrationUserStatistics => "Get-MigrationUserStatistics",
        }
    }

    /// The ordered parameter set for this command
    pub fn parameters(&self) -> Vec<CommandParameter> {
        match self {
            RemoteCommand::GetMailboxes => vec![CommandParameter {
                name: "ResultSize",
                value: ParameterValue::Text("Unlimited".to_string()),
            }],
            RemoteCommand::NewMigrationEndpoint {
                credential,
                email_address,
                name,
            } => vec![
                CommandParameter {
                    name: "Autodiscover",
                    value: ParameterValue::Switch,
                },
                CommandParameter {
                    name: "Credentials",
                    value: ParameterValue::Credential(credential.clone()),
                },
                CommandParameter {
                    name: "EmailAddress",
                    value: ParameterValue::Text(email_address.clone()),
                },
                CommandParameter {
                    name: "ExchangeRemoteMove",
                    value: ParameterValue::Switch,
                },
                CommandParameter {
                    name: "Name",
                    value: ParameterValue::Text(name.clone()),
                },
            ],
            RemoteCommand::NewMigrationBatch {
                csv_data,
                name,
                source_endpoint,
                target_delivery_domain,
            } => vec![
                CommandParameter {
                    name: "CSVData",
                    value: ParameterValue::Bytes(csv_data.clone()),
                },
                CommandParameter {
                    name: "Name",
                    value: ParameterValue::Text(name.clone()),
                },
                CommandParameter {
                    name: "SourceEndpoint",
                    value: ParameterValue::Text(source_endpoint.clone()),
                },
                CommandParameter {
                    name: "TargetDeliveryDomain",
                    value: ParameterValue::Text(target_delivery_domain.clone()),
                },
            ],
            RemoteCommand::GetMigrationBatch { identity } => vec![CommandParameter {
                name: "Identity",
                value: ParameterValue::Text(identity.clone()),
            }],
            RemoteCommand::StartMigrationBatch { identity } => vec![CommandParameter {
                name: "Identity",
                value: ParameterValue::Text(identity.clone()),
            }],
            RemoteCommand::RemoveMigrationBatch { identity } => vec![
                CommandParameter {
                    name: "Confirm",
                    value: ParameterValue::Bool(false),
                },
                CommandParameter {
                    name: "Identity",
                    value: ParameterValue::Text(identity.clone()),
                },
            ],
            RemoteCommand::GetMigrationUsers { batch_id } => vec![CommandParameter {
                name: "BatchId",
                value: ParameterValue::Text(batch_id.clone()),
            }],
            RemoteCommand::GetMigrationUserStatistics => vec![],
        }
    }
}

/// Build the CSV payload for a batch creation command.
///
/// The payload is the literal header `EmailAddress` followed by one row per
/// mailbox primary address, newline-joined with no trailing newline, encoded
/// as ASCII bytes. Addresses are assumed RFC-clean; no escaping is applied.
/// Zero mailboxes produce a header-only payload.
pub fn csv_payload(mailboxes: &[Mailbox]) -> Vec<u8> {
    let mut csv = String::from("EmailAddress");

    for mailbox in mailboxes {
        csv.push('\n');
        csv.push_str(&mailbox.primary_smtp_address);
    }

    csv.into_bytes()
}
