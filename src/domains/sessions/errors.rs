use serde::Serialize;

use super::entity::SessionStatus;
use crate::domains::git::WorktreeError;
use crate::domains::terminal::ProcessError;
use crate::errors::ErrorKind;

#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "type", content = "data")]
pub enum SessionError {
    #[error("Session not found: {id}")]
    NotFound { id: String },
    #[error("Folder not found: {id}")]
    FolderNotFound { id: String },
    #[error("Cannot move session from {from} to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
    #[error("Backing process for session {id} no longer exists")]
    BackingProcessGone { id: String },
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
    #[error(transparent)]
    Worktree(WorktreeError),
    #[error(transparent)]
    Process(ProcessError),
    #[error("Failed to create session: {message}")]
    ResourceCreationFailed { message: String },
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::NotFound { .. } | SessionError::FolderNotFound { .. } => {
                ErrorKind::NotFound
            }
            SessionError::InvalidTransition { .. } => ErrorKind::Conflict,
            SessionError::BackingProcessGone { .. } => ErrorKind::BackingProcessGone,
            SessionError::InvalidInput { .. } => ErrorKind::InvalidInput,
            SessionError::Worktree(e) => e.kind(),
            SessionError::Process(e) => e.kind(),
            SessionError::ResourceCreationFailed { .. } => ErrorKind::ResourceCreationFailed,
            SessionError::Storage { .. } => ErrorKind::Storage,
        }
    }
}

impl From<anyhow::Error> for SessionError {
    fn from(e: anyhow::Error) -> Self {
        SessionError::Storage {
            message: format!("{e:#}"),
        }
    }
}

impl From<rusqlite::Error> for SessionError {
    fn from(e: rusqlite::Error) -> Self {
        SessionError::Storage {
            message: e.to_string(),
        }
    }
}
