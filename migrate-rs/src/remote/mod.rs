//! Remote shell operations against Exchange endpoints
//!
//! - [`connection`]: connection descriptors and credential resolution
//! - [`command`]: typed remote commands and their parameter sets
//! - [`session`]: the [`RemoteShell`] executor trait and HTTP implementation
//! - [`mock`]: scripted shell for tests

pub mod command;
pub mod connection;
pub mod mock;
pub mod session;

pub use command::{csv_payload, CommandParameter, ParameterValue, RemoteCommand};
pub use connection::{ConnectionInfo, Credential};
pub use mock::MockShell;
pub use session::{HttpRemoteShell, RemoteShell, ShellRecord};
