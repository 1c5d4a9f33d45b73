use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Credential resolution failed: {0}")]
    CredentialResolution(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Remote execution reported {} error(s): {}", .messages.len(), .messages.join("\n"))]
    RemoteExecution { messages: Vec<String> },

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl MigrationError {
    /// Build a remote execution error from a single message
    pub fn remote(message: impl Into<String>) -> Self {
        MigrationError::RemoteExecution {
            messages: vec![message.into()],
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
