//! Scripted remote shell for tests
//!
//! Records every pipeline it is asked to run and replays scripted responses
//! in order. Once the script is exhausted, invocations succeed with no
//! output records.

use crate::error::{MigrationError, Result};
use crate::remote::command::RemoteCommand;
use crate::remote::connection::ConnectionInfo;
use crate::remote::session::{RemoteShell, ShellRecord};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A scripted outcome for one invocation
#[derive(Debug, Clone)]
enum ScriptedResponse {
    Records(Vec<ShellRecord>),
    Errors(Vec<String>),
}

/// Remote shell double with scripted responses
#[derive(Debug, Default)]
pub struct MockShell {
    invocations: Mutex<Vec<Vec<RemoteCommand>>>,
    responses: Mutex<VecDeque<ScriptedResponse>>,
}

impl MockShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the records returned by the next invocation
    pub fn push_records(&self, records: Vec<ShellRecord>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(ScriptedResponse::Records(records));
    }

    /// Script a remote failure for the next invocation
    pub fn push_errors(&self, messages: Vec<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(ScriptedResponse::Errors(messages));
    }

    /// Every pipeline invoked so far, in order
    pub fn invocations(&self) -> Vec<Vec<RemoteCommand>> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RemoteShell for MockShell {
    async fn invoke(
        &self,
        _connection: &ConnectionInfo,
        pipeline: &[RemoteCommand],
    ) -> Result<Vec<ShellRecord>> {
        self.invocations.lock().unwrap().push(pipeline.to_vec());

        match self.responses.lock().unwrap().pop_front() {
            Some(ScriptedResponse::Records(records)) => Ok(records),
            Some(ScriptedResponse::Errors(messages)) => {
                Err(MigrationError::RemoteExecution { messages })
            }
            None => Ok(vec![]),
        }
    }
}
