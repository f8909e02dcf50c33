use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrashResourceType {
    Worktree,
}

impl TrashResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrashResourceType::Worktree => "worktree",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "worktree" => Some(TrashResourceType::Worktree),
            _ => None,
        }
    }
}

/// Snapshot needed to put a trashed worktree back where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeTrashMetadata {
    pub repository_id: Option<String>,
    pub repository_name: String,
    pub repository_local_path: PathBuf,
    pub original_path: PathBuf,
    pub trash_path: PathBuf,
    pub original_branch: String,
    pub original_folder_id: Option<String>,
    pub original_folder_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashItem {
    pub id: String,
    pub owner_id: String,
    /// Raw tag as stored; see [`TrashItem::resource_kind`].
    pub resource_type: String,
    pub resource_id: String,
    pub resource_name: String,
    pub trashed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub metadata: Option<WorktreeTrashMetadata>,
}

impl TrashItem {
    pub fn resource_kind(&self) -> Option<TrashResourceType> {
        TrashResourceType::parse(&self.resource_type)
    }
}

/// Where a restored session should be filed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "folder_id", rename_all = "snake_case")]
pub enum FolderChoice {
    /// The folder it was in when trashed, if that folder still exists.
    #[default]
    Original,
    Unfiled,
    Folder(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreRequest {
    pub restore_path: Option<PathBuf>,
    #[serde(default)]
    pub folder: FolderChoice,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub purged_count: usize,
    pub purged_ids: Vec<String>,
}
