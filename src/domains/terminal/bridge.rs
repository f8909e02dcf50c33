use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;

use crate::errors::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "type", content = "data")]
pub enum ProcessError {
    #[error("Process operation '{operation}' failed for '{handle}': {message}")]
    CommandFailed {
        operation: String,
        handle: String,
        message: String,
    },
    #[error("Process operation '{operation}' timed out for '{handle}'")]
    Timeout { operation: String, handle: String },
    #[error("Failed to launch process tool: {message}")]
    Spawn { message: String },
}

impl ProcessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessError::CommandFailed { .. }
            | ProcessError::Timeout { .. }
            | ProcessError::Spawn { .. } => ErrorKind::ExternalToolFailure,
        }
    }
}

/// Keys an external caller may inject into a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum ControlSequence {
    Interrupt,
    Escape,
    Enter,
    Literal(String),
}

/// Narrow view of the terminal multiplexer that keeps a session's shell alive.
#[async_trait]
pub trait ProcessSessionBridge: Send + Sync {
    async fn start(
        &self,
        handle: &str,
        working_dir: &Path,
        startup_command: Option<&str>,
        env: &[(String, String)],
    ) -> Result<(), ProcessError>;

    async fn stop(&self, handle: &str) -> Result<(), ProcessError>;

    async fn exists(&self, handle: &str) -> bool;

    async fn send_control_sequence(
        &self,
        handle: &str,
        sequence: &ControlSequence,
    ) -> Result<(), ProcessError>;
}
