use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Pane size a session carries while it is not part of a split group.
pub const DEFAULT_SPLIT_SIZE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Suspended,
    Closed,
    Trashed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Suspended => "suspended",
            SessionStatus::Closed => "closed",
            SessionStatus::Trashed => "trashed",
        }
    }

    /// Staying in the same status is always allowed so duplicate requests
    /// are harmless.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Active, Suspended)
                | (Suspended, Active)
                | (Active, Closed)
                | (Suspended, Closed)
                | (Active, Trashed)
                | (Trashed, Active)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "suspended" => Ok(SessionStatus::Suspended),
            "closed" => Ok(SessionStatus::Closed),
            "trashed" => Ok(SessionStatus::Trashed),
            other => Err(format!("Invalid session status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub handle_name: String,
    pub working_directory: Option<PathBuf>,
    pub repository_id: Option<String>,
    pub worktree_branch: Option<String>,
    pub folder_id: Option<String>,
    pub split_group_id: Option<String>,
    pub split_order: i64,
    pub split_size: f64,
    pub status: SessionStatus,
    pub tab_order: i64,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn is_worktree_backed(&self) -> bool {
        self.working_directory.is_some() && self.worktree_branch.is_some()
    }
}

/// Asks `create` to materialize a fresh worktree for the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeRequest {
    pub repository_path: PathBuf,
    pub branch: String,
    pub base_branch: Option<String>,
    pub target_path: Option<PathBuf>,
    /// Cached remote repository this worktree belongs to, if known.
    pub repository_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub name: String,
    pub working_directory: Option<PathBuf>,
    pub worktree: Option<WorktreeRequest>,
    pub folder_id: Option<String>,
    pub startup_command: Option<String>,
    #[serde(default)]
    pub env: Vec<(String, String)>,
}

/// Partial update for `SessionRegistry::update`. `folder_id: Some(None)`
/// clears the folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub name: Option<String>,
    pub status: Option<SessionStatus>,
    pub folder_id: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            SessionStatus::Active,
            SessionStatus::Suspended,
            SessionStatus::Closed,
            SessionStatus::Trashed,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("paused".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn closed_is_terminal() {
        let closed = SessionStatus::Closed;
        assert!(!closed.can_transition_to(SessionStatus::Active));
        assert!(!closed.can_transition_to(SessionStatus::Suspended));
        assert!(!closed.can_transition_to(SessionStatus::Trashed));
        assert!(closed.can_transition_to(SessionStatus::Closed));
    }

    #[test]
    fn only_active_sessions_can_be_trashed() {
        assert!(SessionStatus::Active.can_transition_to(SessionStatus::Trashed));
        assert!(!SessionStatus::Suspended.can_transition_to(SessionStatus::Trashed));
        assert!(SessionStatus::Trashed.can_transition_to(SessionStatus::Active));
        assert!(!SessionStatus::Trashed.can_transition_to(SessionStatus::Suspended));
    }
}
