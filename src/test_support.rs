use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

use crate::domains::git::{VcsError, VersionControl, WorktreeAddOptions};
use crate::domains::terminal::{ControlSequence, ProcessError, ProcessSessionBridge};
use crate::infrastructure::database::Database;

pub fn test_db(temp: &TempDir) -> Database {
    Database::new(Some(temp.path().join("tabwerk-test.db"))).unwrap()
}

/// Directory with a `.git` marker, which [`FakeVcs`] treats as a repository.
pub fn fake_repo(parent: &Path, name: &str) -> PathBuf {
    let repo = parent.join(name);
    std::fs::create_dir_all(repo.join(".git")).unwrap();
    repo
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCall {
    pub handle: String,
    pub working_dir: PathBuf,
    pub startup_command: Option<String>,
}

#[derive(Default)]
struct BridgeState {
    live: HashSet<String>,
    started: Vec<StartCall>,
    stopped: Vec<String>,
    sent: Vec<(String, ControlSequence)>,
    fail_start: Option<String>,
    fail_stop: Option<String>,
}

/// In-memory process bridge that behaves like tmux for a single server.
#[derive(Default)]
pub struct FakeProcessBridge {
    state: Mutex<BridgeState>,
}

impl FakeProcessBridge {
    pub fn fail_start(&self, message: &str) {
        self.state.lock().unwrap().fail_start = Some(message.to_string());
    }

    pub fn fail_stop(&self, message: &str) {
        self.state.lock().unwrap().fail_stop = Some(message.to_string());
    }

    /// Simulates the backing process dying on its own.
    pub fn kill_externally(&self, handle: &str) {
        self.state.lock().unwrap().live.remove(handle);
    }

    pub fn is_live(&self, handle: &str) -> bool {
        self.state.lock().unwrap().live.contains(handle)
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    pub fn started(&self) -> Vec<StartCall> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.state.lock().unwrap().stopped.clone()
    }

    pub fn sent(&self) -> Vec<(String, ControlSequence)> {
        self.state.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl ProcessSessionBridge for FakeProcessBridge {
    async fn start(
        &self,
        handle: &str,
        working_dir: &Path,
        startup_command: Option<&str>,
        _env: &[(String, String)],
    ) -> Result<(), ProcessError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_start.clone() {
            return Err(ProcessError::CommandFailed {
                operation: "start".to_string(),
                handle: handle.to_string(),
                message,
            });
        }
        if !state.live.insert(handle.to_string()) {
            return Err(ProcessError::CommandFailed {
                operation: "start".to_string(),
                handle: handle.to_string(),
                message: format!("duplicate session: {handle}"),
            });
        }
        state.started.push(StartCall {
            handle: handle.to_string(),
            working_dir: working_dir.to_path_buf(),
            startup_command: startup_command.map(str::to_string),
        });
        Ok(())
    }

    async fn stop(&self, handle: &str) -> Result<(), ProcessError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_stop.clone() {
            return Err(ProcessError::CommandFailed {
                operation: "stop".to_string(),
                handle: handle.to_string(),
                message,
            });
        }
        if !state.live.remove(handle) {
            return Err(ProcessError::CommandFailed {
                operation: "stop".to_string(),
                handle: handle.to_string(),
                message: format!("can't find session: {handle}"),
            });
        }
        state.stopped.push(handle.to_string());
        Ok(())
    }

    async fn exists(&self, handle: &str) -> bool {
        self.is_live(handle)
    }

    async fn send_control_sequence(
        &self,
        handle: &str,
        sequence: &ControlSequence,
    ) -> Result<(), ProcessError> {
        let mut state = self.state.lock().unwrap();
        if !state.live.contains(handle) {
            return Err(ProcessError::CommandFailed {
                operation: "send_control_sequence".to_string(),
                handle: handle.to_string(),
                message: format!("can't find session: {handle}"),
            });
        }
        state.sent.push((handle.to_string(), sequence.clone()));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedAdd {
    pub repo_path: PathBuf,
    pub worktree_path: PathBuf,
    pub branch: String,
    pub options: WorktreeAddOptions,
}

#[derive(Default)]
struct VcsState {
    refs: HashSet<String>,
    branches: HashMap<PathBuf, String>,
    dirty: HashSet<PathBuf>,
    added: Vec<RecordedAdd>,
    removed: Vec<PathBuf>,
    repaired: Vec<(PathBuf, PathBuf)>,
    fail_add: Option<String>,
    fail_remove: Option<String>,
    fail_repair: Option<String>,
}

/// Directory-backed stand-in for git: `worktree add` creates the directory,
/// `worktree remove` deletes it, `repair` is only recorded.
#[derive(Default)]
pub struct FakeVcs {
    state: Mutex<VcsState>,
}

impl FakeVcs {
    pub fn add_ref(&self, reference: &str) {
        self.state.lock().unwrap().refs.insert(reference.to_string());
    }

    pub fn mark_dirty(&self, path: &Path) {
        self.state.lock().unwrap().dirty.insert(path.to_path_buf());
    }

    pub fn fail_add(&self, message: &str) {
        self.state.lock().unwrap().fail_add = Some(message.to_string());
    }

    pub fn fail_remove(&self, message: &str) {
        self.state.lock().unwrap().fail_remove = Some(message.to_string());
    }

    pub fn fail_repair(&self, message: &str) {
        self.state.lock().unwrap().fail_repair = Some(message.to_string());
    }

    pub fn added(&self) -> Vec<RecordedAdd> {
        self.state.lock().unwrap().added.clone()
    }

    pub fn removed(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().removed.clone()
    }

    pub fn repaired(&self) -> Vec<(PathBuf, PathBuf)> {
        self.state.lock().unwrap().repaired.clone()
    }
}

fn failed(operation: &str, message: &str) -> VcsError {
    VcsError::CommandFailed {
        operation: operation.to_string(),
        message: message.to_string(),
    }
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn is_repository(&self, path: &Path) -> bool {
        path.join(".git").exists()
    }

    async fn worktree_add(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
        branch: &str,
        options: &WorktreeAddOptions,
    ) -> Result<(), VcsError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_add.clone() {
            return Err(failed("worktree add", &message));
        }
        if worktree_path.exists() {
            return Err(failed(
                "worktree add",
                &format!("'{}' already exists", worktree_path.display()),
            ));
        }
        std::fs::create_dir_all(worktree_path)
            .map_err(|e| failed("worktree add", &e.to_string()))?;
        state
            .branches
            .insert(worktree_path.to_path_buf(), branch.to_string());
        state.added.push(RecordedAdd {
            repo_path: repo_path.to_path_buf(),
            worktree_path: worktree_path.to_path_buf(),
            branch: branch.to_string(),
            options: options.clone(),
        });
        Ok(())
    }

    async fn worktree_remove(
        &self,
        _repo_path: &Path,
        worktree_path: &Path,
        _force: bool,
    ) -> Result<(), VcsError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_remove.clone() {
            return Err(failed("worktree remove", &message));
        }
        if worktree_path.exists() {
            std::fs::remove_dir_all(worktree_path)
                .map_err(|e| failed("worktree remove", &e.to_string()))?;
        }
        state.branches.remove(worktree_path);
        state.removed.push(worktree_path.to_path_buf());
        Ok(())
    }

    async fn worktree_repair(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
    ) -> Result<(), VcsError> {
        let mut state = self.state.lock().unwrap();
        state
            .repaired
            .push((repo_path.to_path_buf(), worktree_path.to_path_buf()));
        match state.fail_repair.clone() {
            Some(message) => Err(failed("worktree repair", &message)),
            None => Ok(()),
        }
    }

    async fn current_branch(&self, path: &Path) -> Option<String> {
        self.state.lock().unwrap().branches.get(path).cloned()
    }

    async fn has_uncommitted_changes(&self, path: &Path) -> bool {
        self.state.lock().unwrap().dirty.contains(path)
    }

    async fn resolve_ref(&self, _repo_path: &Path, reference: &str) -> bool {
        self.state.lock().unwrap().refs.contains(reference)
    }
}
