use async_trait::async_trait;
use git2::{Repository, StatusOptions};
use log::debug;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::errors::{ErrorKind, sanitize_diagnostic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "type", content = "data")]
pub enum VcsError {
    #[error("git {operation} failed: {message}")]
    CommandFailed { operation: String, message: String },
    #[error("git {operation} timed out")]
    Timeout { operation: String },
    #[error("Failed to launch git: {message}")]
    Spawn { message: String },
}

impl VcsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VcsError::CommandFailed { .. } | VcsError::Timeout { .. } | VcsError::Spawn { .. } => {
                ErrorKind::ExternalToolFailure
            }
        }
    }

    /// Sanitized diagnostic suitable for surfacing to a caller.
    pub fn diagnostic(&self) -> String {
        match self {
            VcsError::CommandFailed { message, .. } | VcsError::Spawn { message } => {
                message.clone()
            }
            VcsError::Timeout { operation } => format!("git {operation} timed out"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeAddOptions {
    pub create_branch: bool,
    pub start_point: Option<String>,
}

/// The version-control operations the lifecycle core depends on.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn is_repository(&self, path: &Path) -> bool;

    async fn worktree_add(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
        branch: &str,
        options: &WorktreeAddOptions,
    ) -> Result<(), VcsError>;

    async fn worktree_remove(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
        force: bool,
    ) -> Result<(), VcsError>;

    async fn worktree_repair(&self, repo_path: &Path, worktree_path: &Path)
    -> Result<(), VcsError>;

    async fn current_branch(&self, path: &Path) -> Option<String>;

    async fn has_uncommitted_changes(&self, path: &Path) -> bool;

    async fn resolve_ref(&self, repo_path: &Path, reference: &str) -> bool;
}

/// Mutating worktree commands go through the git binary so git's own
/// worktree bookkeeping stays authoritative; read-only probes use libgit2.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: String,
    timeout: Duration,
}

impl GitCli {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    async fn run(&self, operation: &str, repo_path: &Path, args: &[String]) -> Result<(), VcsError> {
        debug!(
            "git -C {} {}",
            repo_path.display(),
            args.join(" ")
        );
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-C")
            .arg(repo_path)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);

        let output: Output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(VcsError::Spawn {
                    message: format!("{}: {e}", self.binary),
                });
            }
            Err(_) => {
                return Err(VcsError::Timeout {
                    operation: operation.to_string(),
                });
            }
        };

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            format!("exit status {}", output.status)
        } else {
            sanitize_diagnostic(&stderr)
        };
        Err(VcsError::CommandFailed {
            operation: operation.to_string(),
            message,
        })
    }
}

pub(crate) fn worktree_add_args(
    worktree_path: &Path,
    branch: &str,
    options: &WorktreeAddOptions,
) -> Vec<String> {
    let mut args = vec!["worktree".to_string(), "add".to_string()];
    if options.create_branch {
        args.push("-b".to_string());
        args.push(branch.to_string());
        args.push(worktree_path.to_string_lossy().to_string());
        if let Some(start) = &options.start_point {
            args.push(start.clone());
        }
    } else {
        args.push(worktree_path.to_string_lossy().to_string());
        args.push(branch.to_string());
    }
    args
}

async fn probe<T, F>(path: &Path, fallback: T, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce(&Path) -> T + Send + 'static,
{
    let path: PathBuf = path.to_path_buf();
    match tokio::task::spawn_blocking(move || f(&path)).await {
        Ok(value) => value,
        Err(e) => {
            debug!("git probe task failed: {e}");
            fallback
        }
    }
}

fn head_branch(path: &Path) -> Option<String> {
    let repo = Repository::open(path).ok()?;
    let head = repo.head().ok()?;
    if !head.is_branch() {
        return None;
    }
    head.shorthand().map(str::to_string)
}

fn is_dirty(path: &Path) -> bool {
    let Ok(repo) = Repository::open(path) else {
        return false;
    };
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    repo.statuses(Some(&mut opts))
        .map(|statuses| !statuses.is_empty())
        .unwrap_or(false)
}

#[async_trait]
impl VersionControl for GitCli {
    async fn is_repository(&self, path: &Path) -> bool {
        probe(path, false, |p| Repository::open(p).is_ok()).await
    }

    async fn worktree_add(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
        branch: &str,
        options: &WorktreeAddOptions,
    ) -> Result<(), VcsError> {
        let args = worktree_add_args(worktree_path, branch, options);
        self.run("worktree add", repo_path, &args).await
    }

    async fn worktree_remove(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
        force: bool,
    ) -> Result<(), VcsError> {
        let mut args = vec!["worktree".to_string(), "remove".to_string()];
        if force {
            args.push("--force".to_string());
        }
        args.push(worktree_path.to_string_lossy().to_string());
        self.run("worktree remove", repo_path, &args).await
    }

    async fn worktree_repair(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
    ) -> Result<(), VcsError> {
        let args = vec![
            "worktree".to_string(),
            "repair".to_string(),
            worktree_path.to_string_lossy().to_string(),
        ];
        self.run("worktree repair", repo_path, &args).await
    }

    async fn current_branch(&self, path: &Path) -> Option<String> {
        probe(path, None, head_branch).await
    }

    async fn has_uncommitted_changes(&self, path: &Path) -> bool {
        probe(path, false, is_dirty).await
    }

    async fn resolve_ref(&self, repo_path: &Path, reference: &str) -> bool {
        let reference = reference.to_string();
        probe(repo_path, false, move |p| {
            Repository::open(p)
                .and_then(|repo| repo.revparse_single(&reference).map(|_| ()))
                .is_ok()
        })
        .await
    }
}
