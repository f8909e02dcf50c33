use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::cli::{VersionControl, WorktreeAddOptions};
use crate::errors::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "type", content = "data")]
pub enum WorktreeError {
    #[error("Not a git repository: {path}")]
    NotARepository { path: String },
    #[error("Path already exists: {path}")]
    PathAlreadyExists { path: String },
    #[error("Invalid branch name: '{branch}'")]
    InvalidBranchName { branch: String },
    #[error("Failed to create worktree: {message}")]
    WorktreeCreationFailed { message: String },
    #[error("Failed to remove worktree: {message}")]
    WorktreeRemovalFailed { message: String },
}

impl WorktreeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorktreeError::NotARepository { .. } | WorktreeError::InvalidBranchName { .. } => {
                ErrorKind::InvalidInput
            }
            WorktreeError::PathAlreadyExists { .. } => ErrorKind::Conflict,
            WorktreeError::WorktreeCreationFailed { .. }
            | WorktreeError::WorktreeRemovalFailed { .. } => ErrorKind::ExternalToolFailure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedWorktree {
    pub branch: String,
    pub path: PathBuf,
    /// Outermost directory this call had to create above `path`, if any.
    #[serde(skip)]
    pub created_root: Option<PathBuf>,
}

/// Outermost ancestor of `dir` (itself included) that does not exist yet.
fn outermost_missing(dir: &Path) -> Option<PathBuf> {
    let mut missing = None;
    let mut current = Some(dir);
    while let Some(path) = current {
        if path.as_os_str().is_empty() || path.exists() {
            break;
        }
        missing = Some(path.to_path_buf());
        current = path.parent();
    }
    missing
}

/// Removes `start` and its parents up to and including `root`, stopping at
/// the first directory that is not empty.
async fn prune_empty_dirs(start: &Path, root: &Path) {
    let mut current = Some(start);
    while let Some(dir) = current {
        if !dir.starts_with(root) || tokio::fs::remove_dir(dir).await.is_err() {
            break;
        }
        if dir == root {
            break;
        }
        current = dir.parent();
    }
}

/// Lower-cases and collapses every run of characters outside `[a-z0-9-]`
/// into a single `-`, then trims dashes from both ends.
pub fn sanitize_branch_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
            out.push(ch);
            in_run = false;
        } else if !in_run {
            out.push('-');
            in_run = true;
        }
    }
    out.trim_matches('-').to_string()
}

/// Creates and removes isolated working copies. Worktrees for `repo` live
/// next to it under `{repo}{suffix}/{branch}`.
#[derive(Clone)]
pub struct WorktreeManager {
    vcs: Arc<dyn VersionControl>,
    dir_suffix: String,
}

impl WorktreeManager {
    pub fn new(vcs: Arc<dyn VersionControl>, dir_suffix: impl Into<String>) -> Self {
        Self {
            vcs,
            dir_suffix: dir_suffix.into(),
        }
    }

    pub async fn is_repository(&self, path: &Path) -> bool {
        self.vcs.is_repository(path).await
    }

    pub fn default_target_path(&self, repo_path: &Path, sanitized_branch: &str) -> PathBuf {
        let repo_name = repo_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "repo".to_string());
        let root_name = format!("{repo_name}{}", self.dir_suffix);
        match repo_path.parent() {
            Some(parent) => parent.join(root_name).join(sanitized_branch),
            None => PathBuf::from(root_name).join(sanitized_branch),
        }
    }

    /// Inverse of [`Self::default_target_path`]: recovers the repository a
    /// worktree was created for when it follows the naming convention.
    pub fn infer_repository_path(&self, worktree_path: &Path) -> Option<PathBuf> {
        let root = worktree_path.parent()?;
        let root_name = root.file_name()?.to_str()?;
        let repo_name = root_name.strip_suffix(self.dir_suffix.as_str())?;
        if repo_name.is_empty() {
            return None;
        }
        Some(root.parent()?.join(repo_name))
    }

    async fn resolve_start_point(&self, repo_path: &Path, base: &str) -> Option<String> {
        let remote = format!("refs/remotes/origin/{base}");
        if self.vcs.resolve_ref(repo_path, &remote).await {
            return Some(format!("origin/{base}"));
        }
        let local = format!("refs/heads/{base}");
        if self.vcs.resolve_ref(repo_path, &local).await {
            return Some(base.to_string());
        }
        None
    }

    pub async fn create_with_new_branch(
        &self,
        repo_path: &Path,
        branch_name: &str,
        base_branch: Option<&str>,
        target_path: Option<&Path>,
    ) -> Result<CreatedWorktree, WorktreeError> {
        if !self.vcs.is_repository(repo_path).await {
            return Err(WorktreeError::NotARepository {
                path: repo_path.display().to_string(),
            });
        }

        let branch = sanitize_branch_name(branch_name);
        if branch.is_empty() {
            return Err(WorktreeError::InvalidBranchName {
                branch: branch_name.to_string(),
            });
        }

        let target = match target_path {
            Some(path) => path.to_path_buf(),
            None => self.default_target_path(repo_path, &branch),
        };
        if target.exists() {
            return Err(WorktreeError::PathAlreadyExists {
                path: target.display().to_string(),
            });
        }
        let parent = target.parent().map(Path::to_path_buf);
        let created_root = parent.as_deref().and_then(outermost_missing);
        if let Some(parent) = &parent {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                WorktreeError::WorktreeCreationFailed {
                    message: format!("Failed to create {}: {e}", parent.display()),
                }
            })?;
        }

        let start_point = match base_branch.map(str::trim).filter(|b| !b.is_empty()) {
            Some(base) => self.resolve_start_point(repo_path, base).await,
            None => None,
        };

        let options = WorktreeAddOptions {
            create_branch: true,
            start_point: start_point.clone(),
        };
        if let Err(e) = self
            .vcs
            .worktree_add(repo_path, &target, &branch, &options)
            .await
        {
            if let (Some(parent), Some(root)) = (&parent, &created_root) {
                prune_empty_dirs(parent, root).await;
            }
            return Err(WorktreeError::WorktreeCreationFailed {
                message: e.diagnostic(),
            });
        }

        info!(
            "Created worktree {} on branch '{branch}' from {}",
            target.display(),
            start_point.as_deref().unwrap_or("HEAD")
        );
        Ok(CreatedWorktree {
            branch,
            path: target,
            created_root,
        })
    }

    /// Undoes [`Self::create_with_new_branch`]: force-removes the worktree,
    /// then any directories that call created for it.
    pub async fn roll_back(
        &self,
        repo_path: &Path,
        created: &CreatedWorktree,
    ) -> Result<(), WorktreeError> {
        self.remove(repo_path, &created.path, true).await?;
        if let (Some(parent), Some(root)) = (created.path.parent(), &created.created_root) {
            prune_empty_dirs(parent, root).await;
        }
        Ok(())
    }

    pub async fn remove(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
        force: bool,
    ) -> Result<(), WorktreeError> {
        self.vcs
            .worktree_remove(repo_path, worktree_path, force)
            .await
            .map_err(|e| WorktreeError::WorktreeRemovalFailed {
                message: e.diagnostic(),
            })?;
        info!("Removed worktree {}", worktree_path.display());
        Ok(())
    }

    /// Re-links a relocated worktree into the repository's worktree registry.
    /// Failures are logged only.
    pub async fn repair(&self, repo_path: &Path, worktree_path: &Path) {
        if let Err(e) = self.vcs.worktree_repair(repo_path, worktree_path).await {
            warn!(
                "Failed to repair worktree {} against {}: {e}",
                worktree_path.display(),
                repo_path.display()
            );
        }
    }

    pub async fn current_branch(&self, path: &Path) -> Option<String> {
        self.vcs.current_branch(path).await
    }

    pub async fn has_uncommitted_changes(&self, path: &Path) -> bool {
        self.vcs.has_uncommitted_changes(path).await
    }
}
