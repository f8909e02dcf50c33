use chrono::Utc;
use log::{debug, info, warn};
use rusqlite::params;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use super::db_sessions::{self, SessionMethods, find_session, folder_is_owned};
use super::entity::{DEFAULT_SPLIT_SIZE, NewSession, Session, SessionPatch, SessionStatus};
use super::errors::SessionError;
use super::lifecycle::Saga;
use crate::domains::git::WorktreeManager;
use crate::domains::settings::CoreSettings;
use crate::domains::terminal::{ControlSequence, ProcessError, ProcessSessionBridge};
use crate::infrastructure::database::Database;
use crate::infrastructure::database::timestamps::utc_from_epoch_seconds_lossy;
use crate::shared::session_handle_name;

/// Owns the session state machine and keeps each record paired with its
/// backing process and optional worktree.
#[derive(Clone)]
pub struct SessionRegistry {
    db: Database,
    bridge: Arc<dyn ProcessSessionBridge>,
    worktrees: WorktreeManager,
    handle_prefix: String,
    default_working_directory: Option<PathBuf>,
}

fn check_patch_transition(from: SessionStatus, to: SessionStatus) -> Result<(), SessionError> {
    // Entering the trash goes through TrashArchive, which also relocates the worktree.
    if to == SessionStatus::Trashed && from != SessionStatus::Trashed {
        return Err(SessionError::InvalidTransition { from, to });
    }
    if !from.can_transition_to(to) {
        return Err(SessionError::InvalidTransition { from, to });
    }
    Ok(())
}

impl SessionRegistry {
    pub fn new(
        db: Database,
        bridge: Arc<dyn ProcessSessionBridge>,
        worktrees: WorktreeManager,
        settings: &CoreSettings,
    ) -> Self {
        Self {
            db,
            bridge,
            worktrees,
            handle_prefix: settings.handle_prefix.clone(),
            default_working_directory: settings.default_working_directory.clone(),
        }
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    pub(crate) fn worktrees(&self) -> &WorktreeManager {
        &self.worktrees
    }

    fn launch_directory(&self, working_directory: Option<&Path>) -> PathBuf {
        working_directory
            .map(Path::to_path_buf)
            .or_else(|| self.default_working_directory.clone())
            .unwrap_or_else(std::env::temp_dir)
    }

    pub async fn create(&self, owner_id: &str, input: NewSession) -> Result<Session, SessionError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(SessionError::InvalidInput {
                message: "Session name must not be empty".to_string(),
            });
        }
        if let Some(folder_id) = &input.folder_id {
            let conn = self.db.get_conn()?;
            if !folder_is_owned(&conn, owner_id, folder_id)? {
                return Err(SessionError::FolderNotFound {
                    id: folder_id.clone(),
                });
            }
        }

        let mut saga = Saga::new(format!("create session '{name}'"));
        let mut working_directory = input.working_directory.clone();
        let mut worktree_branch = None;
        let mut repository_id = None;

        if let Some(request) = &input.worktree {
            let created = self
                .worktrees
                .create_with_new_branch(
                    &request.repository_path,
                    &request.branch,
                    request.base_branch.as_deref(),
                    request.target_path.as_deref(),
                )
                .await
                .map_err(SessionError::Worktree)?;

            let worktrees = self.worktrees.clone();
            let repo_path = request.repository_path.clone();
            let undo = created.clone();
            saga.on_failure("worktree", move || async move {
                worktrees
                    .roll_back(&repo_path, &undo)
                    .await
                    .map_err(anyhow::Error::from)
            });

            working_directory = Some(created.path);
            worktree_branch = Some(created.branch);
            repository_id = request.repository_id.clone();
        }

        let id = Uuid::new_v4().to_string();
        let handle_name = session_handle_name(&self.handle_prefix, &id);
        let launch_dir = self.launch_directory(working_directory.as_deref());

        if let Err(e) = self
            .bridge
            .start(
                &handle_name,
                &launch_dir,
                input.startup_command.as_deref(),
                &input.env,
            )
            .await
        {
            saga.compensate().await;
            return Err(SessionError::ResourceCreationFailed {
                message: format!("Failed to start backing process: {e}"),
            });
        }

        let bridge = self.bridge.clone();
        let handle = handle_name.clone();
        saga.on_failure("process", move || async move {
            bridge.stop(&handle).await.map_err(anyhow::Error::from)
        });

        let now = utc_from_epoch_seconds_lossy(Utc::now().timestamp());
        let mut session = Session {
            id,
            owner_id: owner_id.to_string(),
            name,
            handle_name,
            working_directory,
            repository_id,
            worktree_branch,
            folder_id: input.folder_id.clone(),
            split_group_id: None,
            split_order: 0,
            split_size: DEFAULT_SPLIT_SIZE,
            status: SessionStatus::Active,
            tab_order: 0,
            last_activity_at: now,
            created_at: now,
            updated_at: now,
        };

        let persisted = self.db.with_write_transaction(|tx| {
            if let Some(folder_id) = &session.folder_id
                && !folder_is_owned(tx, owner_id, folder_id)?
            {
                return Err(SessionError::FolderNotFound {
                    id: folder_id.clone(),
                });
            }
            db_sessions::insert_session(tx, &mut session)?;
            Ok(())
        });

        if let Err(e) = persisted {
            saga.compensate().await;
            return Err(SessionError::ResourceCreationFailed {
                message: format!("Failed to persist session: {e}"),
            });
        }

        saga.commit();
        info!(
            "Created session '{}' ({}) for {owner_id} with handle {}",
            session.name, session.id, session.handle_name
        );
        Ok(session)
    }

    pub fn get(&self, owner_id: &str, id: &str) -> Result<Session, SessionError> {
        self.db
            .get_session(owner_id, id)?
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })
    }

    /// Sessions for `owner_id` in tab order. An empty `statuses` slice lists all.
    pub fn list(
        &self,
        owner_id: &str,
        statuses: &[SessionStatus],
    ) -> Result<Vec<Session>, SessionError> {
        Ok(self.db.list_sessions(owner_id, statuses)?)
    }

    pub async fn update(
        &self,
        owner_id: &str,
        id: &str,
        patch: SessionPatch,
    ) -> Result<Session, SessionError> {
        if let Some(name) = &patch.name
            && name.trim().is_empty()
        {
            return Err(SessionError::InvalidInput {
                message: "Session name must not be empty".to_string(),
            });
        }

        let current = self.get(owner_id, id)?;
        if let Some(Some(folder_id)) = &patch.folder_id {
            let conn = self.db.get_conn()?;
            if !folder_is_owned(&conn, owner_id, folder_id)? {
                return Err(SessionError::FolderNotFound {
                    id: folder_id.clone(),
                });
            }
        }
        if let Some(next) = patch.status {
            check_patch_transition(current.status, next)?;
            if next == SessionStatus::Closed && current.status != SessionStatus::Closed {
                self.stop_process_best_effort(&current.handle_name, "update")
                    .await;
            }
        }

        self.db.with_write_transaction(|tx| {
            let fresh = find_session(tx, owner_id, id)?
                .ok_or_else(|| SessionError::NotFound { id: id.to_string() })?;
            if let Some(next) = patch.status {
                check_patch_transition(fresh.status, next)?;
            }
            if let Some(Some(folder_id)) = &patch.folder_id
                && !folder_is_owned(tx, owner_id, folder_id)?
            {
                return Err(SessionError::FolderNotFound {
                    id: folder_id.clone(),
                });
            }

            tx.execute(
                "UPDATE sessions
                 SET name = COALESCE(?1, name),
                     status = COALESCE(?2, status),
                     folder_id = CASE WHEN ?3 THEN ?4 ELSE folder_id END,
                     updated_at = ?5
                 WHERE id = ?6 AND owner_id = ?7",
                params![
                    patch.name.as_deref().map(str::trim),
                    patch.status.map(|s| s.as_str()),
                    patch.folder_id.is_some(),
                    patch.folder_id.clone().flatten(),
                    Utc::now().timestamp(),
                    id,
                    owner_id,
                ],
            )?;

            find_session(tx, owner_id, id)?
                .ok_or_else(|| SessionError::NotFound { id: id.to_string() })
        })
    }

    fn transition(
        &self,
        owner_id: &str,
        id: &str,
        to: SessionStatus,
    ) -> Result<Session, SessionError> {
        self.db.with_write_transaction(|tx| {
            let current = find_session(tx, owner_id, id)?
                .ok_or_else(|| SessionError::NotFound { id: id.to_string() })?;
            if !current.status.can_transition_to(to) {
                return Err(SessionError::InvalidTransition {
                    from: current.status,
                    to,
                });
            }
            if current.status == to {
                return Ok(current);
            }
            db_sessions::update_status(tx, owner_id, id, to)?;
            find_session(tx, owner_id, id)?
                .ok_or_else(|| SessionError::NotFound { id: id.to_string() })
        })
    }

    pub fn suspend(&self, owner_id: &str, id: &str) -> Result<Session, SessionError> {
        let session = self.transition(owner_id, id, SessionStatus::Suspended)?;
        info!("Suspended session {id}");
        Ok(session)
    }

    pub async fn resume(&self, owner_id: &str, id: &str) -> Result<Session, SessionError> {
        let current = self.get(owner_id, id)?;
        if !matches!(
            current.status,
            SessionStatus::Active | SessionStatus::Suspended
        ) {
            return Err(SessionError::InvalidTransition {
                from: current.status,
                to: SessionStatus::Active,
            });
        }
        if !self.bridge.exists(&current.handle_name).await {
            return Err(SessionError::BackingProcessGone { id: id.to_string() });
        }
        let session = self.transition(owner_id, id, SessionStatus::Active)?;
        info!("Resumed session {id}");
        Ok(session)
    }

    /// Kills the backing process and marks the session closed. The worktree,
    /// if any, stays on disk.
    pub async fn close(&self, owner_id: &str, id: &str) -> Result<Session, SessionError> {
        let current = self.get(owner_id, id)?;
        if current.status == SessionStatus::Closed {
            return Ok(current);
        }
        if !current.status.can_transition_to(SessionStatus::Closed) {
            return Err(SessionError::InvalidTransition {
                from: current.status,
                to: SessionStatus::Closed,
            });
        }

        if self.bridge.exists(&current.handle_name).await {
            self.bridge
                .stop(&current.handle_name)
                .await
                .map_err(SessionError::Process)?;
        } else {
            debug!(
                "Backing process {} already gone while closing session {id}",
                current.handle_name
            );
        }

        let session = self.transition(owner_id, id, SessionStatus::Closed)?;
        info!("Closed session {id}");
        Ok(session)
    }

    /// Rewrites tab positions to match `ordered_ids`. Either every id is
    /// updated or none is.
    pub fn reorder(&self, owner_id: &str, ordered_ids: &[String]) -> Result<(), SessionError> {
        let mut seen = HashSet::new();
        if let Some(dup) = ordered_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(SessionError::InvalidInput {
                message: format!("Duplicate session id in ordering: {dup}"),
            });
        }

        self.db.with_write_transaction(|tx| {
            let now = Utc::now().timestamp();
            for (index, id) in ordered_ids.iter().enumerate() {
                let changed = tx.execute(
                    "UPDATE sessions SET tab_order = ?1, updated_at = ?2
                     WHERE id = ?3 AND owner_id = ?4",
                    params![index as i64, now, id, owner_id],
                )?;
                if changed == 0 {
                    return Err(SessionError::NotFound { id: id.clone() });
                }
            }
            Ok(())
        })
    }

    pub fn record_activity(&self, owner_id: &str, id: &str) -> Result<(), SessionError> {
        if self.db.touch_session_activity(owner_id, id)? {
            Ok(())
        } else {
            Err(SessionError::NotFound { id: id.to_string() })
        }
    }

    /// Injects keys into the live process, e.g. an interrupt to pause a
    /// runaway command.
    pub async fn send_control_sequence(
        &self,
        owner_id: &str,
        id: &str,
        sequence: &ControlSequence,
    ) -> Result<(), SessionError> {
        let session = self.get(owner_id, id)?;
        if !self.bridge.exists(&session.handle_name).await {
            return Err(SessionError::BackingProcessGone { id: id.to_string() });
        }
        self.bridge
            .send_control_sequence(&session.handle_name, sequence)
            .await
            .map_err(SessionError::Process)
    }

    /// Drops a session that was created as part of a larger operation that
    /// later failed.
    pub(crate) async fn discard(&self, owner_id: &str, id: &str) {
        let session = match self.get(owner_id, id) {
            Ok(session) => session,
            Err(e) => {
                warn!("Failed to load session {id} for discard: {e}");
                return;
            }
        };
        self.stop_process_best_effort(&session.handle_name, "discard")
            .await;
        let deleted = self
            .db
            .get_conn()
            .and_then(|conn| Ok(db_sessions::delete_session(&conn, owner_id, id)?));
        if let Err(e) = deleted {
            warn!("Failed to delete discarded session {id}: {e}");
        }
    }

    pub(crate) async fn stop_process_best_effort(&self, handle: &str, context: &str) {
        if !self.bridge.exists(handle).await {
            debug!("[{context}] backing process {handle} already gone");
            return;
        }
        if let Err(e) = self.bridge.stop(handle).await {
            warn!("[{context}] failed to stop backing process {handle}: {e}");
        }
    }

    pub(crate) async fn start_backing_process(&self, session: &Session) -> Result<(), ProcessError> {
        if self.bridge.exists(&session.handle_name).await {
            return Ok(());
        }
        let launch_dir = self.launch_directory(session.working_directory.as_deref());
        self.bridge
            .start(&session.handle_name, &launch_dir, None, &[])
            .await
    }
}
