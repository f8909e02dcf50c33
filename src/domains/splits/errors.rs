use serde::Serialize;

use crate::domains::sessions::{SessionError, SessionStatus};
use crate::errors::ErrorKind;

#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "type", content = "data")]
pub enum SplitError {
    #[error("Split group not found: {id}")]
    SplitNotFound { id: String },
    #[error("Session not found: {id}")]
    SessionNotFound { id: String },
    #[error("Session {id} is not part of a split")]
    NotInSplit { id: String },
    #[error("Session {id} is {status} and cannot join a split")]
    SessionUnavailable { id: String, status: SessionStatus },
    #[error("Invalid layout: {message}")]
    InvalidLayout { message: String },
    #[error(transparent)]
    Session(SessionError),
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl SplitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SplitError::SplitNotFound { .. } => ErrorKind::Conflict,
            SplitError::SessionNotFound { .. } => ErrorKind::NotFound,
            SplitError::NotInSplit { .. } | SplitError::SessionUnavailable { .. } => {
                ErrorKind::Conflict
            }
            SplitError::InvalidLayout { .. } => ErrorKind::InvalidInput,
            SplitError::Session(e) => e.kind(),
            SplitError::Storage { .. } => ErrorKind::Storage,
        }
    }
}

impl From<anyhow::Error> for SplitError {
    fn from(e: anyhow::Error) -> Self {
        SplitError::Storage {
            message: format!("{e:#}"),
        }
    }
}

impl From<rusqlite::Error> for SplitError {
    fn from(e: rusqlite::Error) -> Self {
        SplitError::Storage {
            message: e.to_string(),
        }
    }
}
