//! Remote shell executor
//!
//! [`RemoteShell`] runs an ordered pipeline of commands against a connection
//! descriptor and returns the structured records the remote side produced.
//! The HTTP implementation opens a session, runs the pipeline, and closes the
//! session on every exit path: success, remote error, local error or timeout.
//! Remote error records never come back as output; they are aggregated into a
//! single [`MigrationError::RemoteExecution`].

use crate::error::{MigrationError, Result};
use crate::remote::command::{CommandParameter, ParameterValue, RemoteCommand};
use crate::remote::connection::ConnectionInfo;
use crate::telemetry::Telemetry;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// One structured output record from a remote command
#[derive(Debug, Clone, PartialEq)]
pub struct ShellRecord(Map<String, Value>);

impl ShellRecord {
    pub fn new(properties: Map<String, Value>) -> Self {
        Self(properties)
    }

    /// Build a record from string properties
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut properties = Map::new();
        for (name, value) in pairs {
            properties.insert((*name).to_string(), Value::String((*value).to_string()));
        }
        Self(properties)
    }

    /// Get a string property by name
    pub fn property(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }
}

/// Executes command pipelines in a remote shell session
#[async_trait::async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run the pipeline in a fresh session and return its output records in
    /// order. Fails with [`MigrationError::RemoteExecution`] when the remote
    /// run reported one or more errors.
    async fn invoke(
        &self,
        connection: &ConnectionInfo,
        pipeline: &[RemoteCommand],
    ) -> Result<Vec<ShellRecord>>;
}

/// Remote shell over an HTTP session gateway
pub struct HttpRemoteShell {
    client: reqwest::Client,
    timeout: Duration,
    telemetry: Telemetry,
}

#[derive(Debug, Deserialize)]
struct OpenSessionResponse {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct PipelineResponse {
    #[serde(default)]
    output: Vec<Map<String, Value>>,
    #[serde(default)]
    errors: Vec<String>,
}

impl HttpRemoteShell {
    pub fn new(timeout: Duration, telemetry: Telemetry) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
            telemetry,
        }
    }

    /// Open a session against the connection endpoint
    async fn open_session(&self, connection: &ConnectionInfo) -> Result<String> {
        let url = session_url(&connection.endpoint, &[])?;

        let response = self
            .client
            .post(url)
            .basic_auth(
                &connection.credential.username,
                Some(&connection.credential.password),
            )
            .json(&json!({ "schemaUri": connection.schema_uri }))
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let opened: OpenSessionResponse = response.json().await?;
        debug!("Opened remote session {}", opened.session_id);
        Ok(opened.session_id)
    }

    /// Run the pipeline inside an open session
    async fn run_pipeline(
        &self,
        connection: &ConnectionInfo,
        session_id: &str,
        pipeline: &[RemoteCommand],
    ) -> Result<Vec<ShellRecord>> {
        let url = session_url(&connection.endpoint, &[session_id, "pipeline"])?;
        let body = json!({
            "commands": pipeline.iter().map(command_json).collect::<Vec<Value>>(),
        });

        let response = self
            .client
            .post(url)
            .basic_auth(
                &connection.credential.username,
                Some(&connection.credential.password),
            )
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let parsed: PipelineResponse = response.json().await?;
        collect_records(parsed)
    }

    /// Close the session. Best effort: a failed close is logged, never raised,
    /// so it cannot mask the pipeline outcome.
    async fn close_session(&self, connection: &ConnectionInfo, session_id: &str) {
        let url = match session_url(&connection.endpoint, &[session_id]) {
            Ok(url) => url,
            Err(e) => {
                warn!("Could not build session close URL: {}", e);
                return;
            }
        };

        let result = self
            .client
            .delete(url)
            .basic_auth(
                &connection.credential.username,
                Some(&connection.credential.password),
            )
            .timeout(self.timeout)
            .send()
            .await;

        if let Err(e) = result {
            warn!("Failed to close remote session {}: {}", session_id, e);
        }
    }
}

#[async_trait::async_trait]
impl RemoteShell for HttpRemoteShell {
    async fn invoke(
        &self,
        connection: &ConnectionInfo,
        pipeline: &[RemoteCommand],
    ) -> Result<Vec<ShellRecord>> {
        let started = Instant::now();
        let session_id = self.open_session(connection).await?;

        let result = match tokio::time::timeout(
            self.timeout,
            self.run_pipeline(connection, &session_id, pipeline),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(MigrationError::remote(format!(
                "remote pipeline timed out after {}s",
                self.timeout.as_secs()
            ))),
        };

        // The session is released on every path before the result propagates.
        self.close_session(connection, &session_id).await;

        let command_text = pipeline
            .iter()
            .map(RemoteCommand::name)
            .collect::<Vec<_>>()
            .join(" | ");

        self.telemetry.track_event(
            "InvokeCommand",
            &[("CommandText", command_text.as_str())],
            &[
                (
                    "ElapsedMilliseconds",
                    started.elapsed().as_secs_f64() * 1000.0,
                ),
                ("NumberOfCommands", pipeline.len() as f64),
            ],
        );

        result
    }
}

/// Append path segments to the endpoint, keeping its query string intact
fn session_url(endpoint: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = endpoint.clone();

    {
        let mut path = url.path_segments_mut().map_err(|_| {
            MigrationError::InvalidEndpoint(format!("'{}' cannot carry a session path", endpoint))
        })?;
        path.pop_if_empty();
        path.push("sessions");
        for segment in segments {
            path.push(segment);
        }
    }

    Ok(url)
}

/// Wire form of a single command
fn command_json(command: &RemoteCommand) -> Value {
    json!({
        "name": command.name(),
        "parameters": command
            .parameters()
            .iter()
            .map(parameter_json)
            .collect::<Vec<Value>>(),
    })
}

fn parameter_json(parameter: &CommandParameter) -> Value {
    let value = match &parameter.value {
        ParameterValue::Text(text) => Value::String(text.clone()),
        // CSV payloads are ASCII by construction
        ParameterValue::Bytes(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ParameterValue::Bool(flag) => Value::Bool(*flag),
        ParameterValue::Switch => Value::Bool(true),
        ParameterValue::Credential(credential) => json!({
            "username": credential.username,
            "password": credential.password,
        }),
    };

    json!({ "name": parameter.name, "value": value })
}

/// Turn a pipeline response into output records, or aggregate its error
/// records into a single failure
fn collect_records(response: PipelineResponse) -> Result<Vec<ShellRecord>> {
    if !response.errors.is_empty() {
        return Err(MigrationError::RemoteExecution {
            messages: response.errors,
        });
    }

    Ok(response.output.into_iter().map(ShellRecord::new).collect())
}
