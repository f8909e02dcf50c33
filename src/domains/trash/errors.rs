use serde::Serialize;

use crate::domains::sessions::SessionStatus;
use crate::errors::ErrorKind;

#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "type", content = "data")]
pub enum TrashError {
    #[error("Trash item not found: {id}")]
    NotFound { id: String },
    #[error("Session not found: {id}")]
    SessionNotFound { id: String },
    #[error("Folder not found: {id}")]
    FolderNotFound { id: String },
    #[error("Session {id} is already in the trash")]
    AlreadyTrashed { id: String },
    #[error("Session {id} has no worktree to trash")]
    NotWorktreeBacked { id: String },
    #[error("Session {id} is {status} and cannot be trashed")]
    InvalidState { id: String, status: SessionStatus },
    #[error("Failed to relocate worktree: {message}")]
    RelocationFailed { message: String },
    #[error("Trashed directory is missing: {path}")]
    TrashDirectoryMissing { path: String },
    #[error("Restore target already exists: {path}")]
    PathAlreadyExists { path: String },
    #[error("Failed to clean up trashed files: {message}")]
    CleanupFailed { message: String },
    #[error("Unsupported trash resource type: {resource_type}")]
    UnsupportedResource { resource_type: String },
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl TrashError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrashError::NotFound { .. }
            | TrashError::SessionNotFound { .. }
            | TrashError::FolderNotFound { .. }
            | TrashError::TrashDirectoryMissing { .. } => ErrorKind::NotFound,
            TrashError::AlreadyTrashed { .. }
            | TrashError::InvalidState { .. }
            | TrashError::PathAlreadyExists { .. } => ErrorKind::Conflict,
            TrashError::NotWorktreeBacked { .. } | TrashError::UnsupportedResource { .. } => {
                ErrorKind::InvalidInput
            }
            TrashError::RelocationFailed { .. }
            | TrashError::CleanupFailed { .. }
            | TrashError::Storage { .. } => ErrorKind::Storage,
        }
    }
}

impl From<anyhow::Error> for TrashError {
    fn from(e: anyhow::Error) -> Self {
        TrashError::Storage {
            message: format!("{e:#}"),
        }
    }
}

impl From<rusqlite::Error> for TrashError {
    fn from(e: rusqlite::Error) -> Self {
        TrashError::Storage {
            message: e.to_string(),
        }
    }
}
