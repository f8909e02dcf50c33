use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::{Connection, params};
use std::path::Path;
use uuid::Uuid;

use super::db_trash::{TrashMethods, delete_trash_item, insert_trash_item};
use super::entity::{
    FolderChoice, RestoreRequest, SweepReport, TrashItem, TrashResourceType,
    WorktreeTrashMetadata,
};
use super::errors::TrashError;
use super::resolver::resolve_repository;
use crate::domains::git::sanitize_branch_name;
use crate::domains::sessions::db_sessions::{find_session, folder_is_owned};
use crate::domains::sessions::{Session, SessionError, SessionRegistry, SessionStatus};
use crate::domains::settings::CoreSettings;
use crate::domains::splits::db_splits::detach_from_split;
use crate::infrastructure::database::timestamps::utc_from_epoch_millis_lossy;
use crate::infrastructure::database::{Database, FolderMethods};

/// Soft-deletes worktree-backed sessions by moving the worktree into the
/// repository's trash directory, and restores or purges them later.
#[derive(Clone)]
pub struct TrashArchive {
    sessions: SessionRegistry,
    trash_dir_name: String,
    retention: chrono::Duration,
}

fn session_error(e: SessionError) -> TrashError {
    match e {
        SessionError::NotFound { id } => TrashError::SessionNotFound { id },
        SessionError::Storage { message } => TrashError::Storage { message },
        other => TrashError::Storage {
            message: other.to_string(),
        },
    }
}

fn resolve_folder(
    conn: &Connection,
    owner_id: &str,
    metadata: &WorktreeTrashMetadata,
    choice: &FolderChoice,
) -> Result<Option<String>, TrashError> {
    match choice {
        FolderChoice::Folder(id) => {
            if folder_is_owned(conn, owner_id, id)? {
                Ok(Some(id.clone()))
            } else {
                Err(TrashError::FolderNotFound { id: id.clone() })
            }
        }
        FolderChoice::Unfiled => Ok(None),
        FolderChoice::Original => match &metadata.original_folder_id {
            Some(id) if folder_is_owned(conn, owner_id, id)? => Ok(Some(id.clone())),
            _ => Ok(None),
        },
    }
}

/// Undoes a directory move after a failed database write. Failure here is
/// logged only.
async fn move_back(from: &Path, to: &Path, context: &str) {
    if let Err(e) = tokio::fs::rename(from, to).await {
        warn!(
            "[{context}] failed to move {} back to {}: {e}",
            from.display(),
            to.display()
        );
    }
}

impl TrashArchive {
    pub fn new(sessions: SessionRegistry, settings: &CoreSettings) -> Self {
        Self {
            sessions,
            trash_dir_name: settings.trash_dir_name.clone(),
            retention: settings.trash_retention(),
        }
    }

    fn db(&self) -> &Database {
        self.sessions.db()
    }

    pub async fn trash(&self, owner_id: &str, session_id: &str) -> Result<TrashItem, TrashError> {
        let session = self
            .sessions
            .get(owner_id, session_id)
            .map_err(session_error)?;
        if session.status == SessionStatus::Trashed {
            return Err(TrashError::AlreadyTrashed {
                id: session_id.to_string(),
            });
        }
        let (Some(worktree_path), Some(branch)) = (
            session.working_directory.clone(),
            session.worktree_branch.clone(),
        ) else {
            return Err(TrashError::NotWorktreeBacked {
                id: session_id.to_string(),
            });
        };
        if !session.status.can_transition_to(SessionStatus::Trashed) {
            return Err(TrashError::InvalidState {
                id: session_id.to_string(),
                status: session.status,
            });
        }

        let repository = resolve_repository(
            self.db(),
            self.sessions.worktrees(),
            &session,
            &worktree_path,
        )
        .await?
        .ok_or_else(|| TrashError::RelocationFailed {
            message: format!(
                "Cannot determine repository for {}",
                worktree_path.display()
            ),
        })?;
        let folder_name = match &session.folder_id {
            Some(folder_id) => self
                .db()
                .get_folder(owner_id, folder_id)?
                .map(|folder| folder.name),
            None => None,
        };

        let trashed_at = utc_from_epoch_millis_lossy(Utc::now().timestamp_millis());
        let trash_root = repository.path.join(&self.trash_dir_name);
        let label = match sanitize_branch_name(&branch) {
            sanitized if sanitized.is_empty() => "worktree".to_string(),
            sanitized => sanitized,
        };
        let trash_path = trash_root.join(format!("{label}-{}", trashed_at.timestamp_millis()));

        // Nothing is persisted until the worktree has actually moved.
        tokio::fs::create_dir_all(&trash_root)
            .await
            .map_err(|e| TrashError::RelocationFailed {
                message: format!("Failed to create {}: {e}", trash_root.display()),
            })?;
        tokio::fs::rename(&worktree_path, &trash_path)
            .await
            .map_err(|e| TrashError::RelocationFailed {
                message: format!(
                    "Failed to move {} to {}: {e}",
                    worktree_path.display(),
                    trash_path.display()
                ),
            })?;

        self.sessions
            .stop_process_best_effort(&session.handle_name, "trash")
            .await;

        let item = TrashItem {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            resource_type: TrashResourceType::Worktree.as_str().to_string(),
            resource_id: session.id.clone(),
            resource_name: session.name.clone(),
            trashed_at,
            expires_at: trashed_at + self.retention,
            metadata: Some(WorktreeTrashMetadata {
                repository_id: repository.repository_id.clone(),
                repository_name: repository.name.clone(),
                repository_local_path: repository.path.clone(),
                original_path: worktree_path.clone(),
                trash_path: trash_path.clone(),
                original_branch: branch,
                original_folder_id: session.folder_id.clone(),
                original_folder_name: folder_name,
            }),
        };

        let persisted = self.db().with_write_transaction(|tx| {
            let fresh = find_session(tx, owner_id, session_id)?.ok_or_else(|| {
                TrashError::SessionNotFound {
                    id: session_id.to_string(),
                }
            })?;
            if fresh.status == SessionStatus::Trashed {
                return Err(TrashError::AlreadyTrashed {
                    id: session_id.to_string(),
                });
            }
            detach_from_split(tx, owner_id, session_id)?;
            insert_trash_item(tx, &item)?;
            tx.execute(
                "UPDATE sessions SET status = ?1, folder_id = NULL, updated_at = ?2
                 WHERE id = ?3 AND owner_id = ?4",
                params![
                    SessionStatus::Trashed.as_str(),
                    Utc::now().timestamp(),
                    session_id,
                    owner_id
                ],
            )?;
            Ok(())
        });

        if let Err(e) = persisted {
            move_back(&trash_path, &worktree_path, "trash").await;
            if let Err(restart) = self.sessions.start_backing_process(&session).await {
                warn!("[trash] failed to restart process for session {session_id}: {restart}");
            }
            return Err(e);
        }

        info!(
            "Trashed session {session_id}: {} -> {}",
            worktree_path.display(),
            trash_path.display()
        );
        Ok(item)
    }

    pub async fn restore(
        &self,
        owner_id: &str,
        trash_item_id: &str,
        request: RestoreRequest,
    ) -> Result<Session, TrashError> {
        let not_found = || TrashError::NotFound {
            id: trash_item_id.to_string(),
        };
        let item = self
            .db()
            .get_trash_item(owner_id, trash_item_id)?
            .ok_or_else(not_found)?;
        let metadata = item.metadata.clone().ok_or_else(not_found)?;
        self.sessions
            .get(owner_id, &item.resource_id)
            .map_err(|e| match e {
                SessionError::NotFound { .. } => not_found(),
                other => session_error(other),
            })?;

        {
            let conn = self.db().get_conn()?;
            resolve_folder(&conn, owner_id, &metadata, &request.folder)?;
        }

        let target = request
            .restore_path
            .clone()
            .unwrap_or_else(|| metadata.original_path.clone());
        if !metadata.trash_path.exists() {
            return Err(TrashError::TrashDirectoryMissing {
                path: metadata.trash_path.display().to_string(),
            });
        }
        if target.exists() {
            return Err(TrashError::PathAlreadyExists {
                path: target.display().to_string(),
            });
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TrashError::RelocationFailed {
                    message: format!("Failed to create {}: {e}", parent.display()),
                })?;
        }
        tokio::fs::rename(&metadata.trash_path, &target)
            .await
            .map_err(|e| TrashError::RelocationFailed {
                message: format!(
                    "Failed to move {} to {}: {e}",
                    metadata.trash_path.display(),
                    target.display()
                ),
            })?;

        self.sessions
            .worktrees()
            .repair(&metadata.repository_local_path, &target)
            .await;

        let persisted = self.db().with_write_transaction(|tx| {
            let folder_id = resolve_folder(tx, owner_id, &metadata, &request.folder)?;
            if delete_trash_item(tx, owner_id, trash_item_id)? == 0 {
                return Err(not_found());
            }
            let changed = tx.execute(
                "UPDATE sessions
                 SET status = ?1, working_directory = ?2, folder_id = ?3, updated_at = ?4
                 WHERE id = ?5 AND owner_id = ?6 AND status = ?7",
                params![
                    SessionStatus::Active.as_str(),
                    target.to_string_lossy(),
                    folder_id,
                    Utc::now().timestamp(),
                    item.resource_id,
                    owner_id,
                    SessionStatus::Trashed.as_str(),
                ],
            )?;
            if changed == 0 {
                return Err(not_found());
            }
            find_session(tx, owner_id, &item.resource_id)?.ok_or_else(not_found)
        });

        let restored = match persisted {
            Ok(session) => session,
            Err(e) => {
                move_back(&target, &metadata.trash_path, "restore").await;
                return Err(e);
            }
        };

        if let Err(e) = self.sessions.start_backing_process(&restored).await {
            warn!(
                "[restore] failed to restart process for session {}: {e}",
                restored.id
            );
        }
        info!(
            "Restored trash item {trash_item_id} to {}",
            target.display()
        );
        Ok(restored)
    }

    pub async fn permanently_delete(
        &self,
        owner_id: &str,
        trash_item_id: &str,
    ) -> Result<(), TrashError> {
        let item = self
            .db()
            .get_trash_item(owner_id, trash_item_id)?
            .ok_or_else(|| TrashError::NotFound {
                id: trash_item_id.to_string(),
            })?;
        self.purge(&item, false).await?;
        info!("Permanently deleted trash item {trash_item_id}");
        Ok(())
    }

    /// With `strict`, a filesystem failure aborts before any record is
    /// touched so the item can be retried; otherwise it is logged and the
    /// records are removed anyway.
    async fn purge(&self, item: &TrashItem, strict: bool) -> Result<(), TrashError> {
        let Some(kind) = item.resource_kind() else {
            return Err(TrashError::UnsupportedResource {
                resource_type: item.resource_type.clone(),
            });
        };

        match kind {
            TrashResourceType::Worktree => {
                if let Some(metadata) = &item.metadata
                    && metadata.trash_path.exists()
                    && let Err(e) = tokio::fs::remove_dir_all(&metadata.trash_path).await
                {
                    let message = format!(
                        "Failed to remove {}: {e}",
                        metadata.trash_path.display()
                    );
                    if strict {
                        return Err(TrashError::CleanupFailed { message });
                    }
                    warn!("[purge] trash item {}: {message}", item.id);
                }
            }
        }

        let owner_id = item.owner_id.as_str();
        self.db().with_write_transaction(|tx| {
            tx.execute(
                "DELETE FROM sessions WHERE id = ?1 AND owner_id = ?2 AND status = ?3",
                params![item.resource_id, owner_id, SessionStatus::Trashed.as_str()],
            )?;
            if delete_trash_item(tx, owner_id, &item.id)? == 0 {
                return Err(TrashError::NotFound {
                    id: item.id.clone(),
                });
            }
            Ok(())
        })
    }

    /// Purges every item, across all owners, whose retention ended before
    /// `now`. One item's failure does not stop the rest.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport, TrashError> {
        let expired = self.db().list_expired_trash_items(now.timestamp_millis())?;
        let mut report = SweepReport::default();

        for item in expired {
            if item.resource_kind().is_none() {
                warn!(
                    "[sweep] skipping trash item {} with unknown resource type '{}'",
                    item.id, item.resource_type
                );
                continue;
            }
            match self.purge(&item, true).await {
                Ok(()) => report.purged_ids.push(item.id),
                Err(e) => warn!(
                    "[sweep] failed to purge trash item {} (owner {}): {e}",
                    item.id, item.owner_id
                ),
            }
        }

        report.purged_count = report.purged_ids.len();
        if report.purged_count > 0 {
            info!("Swept {} expired trash item(s)", report.purged_count);
        }
        Ok(report)
    }

    pub fn list(&self, owner_id: &str) -> Result<Vec<TrashItem>, TrashError> {
        Ok(self.db().list_trash_items(owner_id)?)
    }

    pub fn get(&self, owner_id: &str, trash_item_id: &str) -> Result<TrashItem, TrashError> {
        self.db()
            .get_trash_item(owner_id, trash_item_id)?
            .ok_or_else(|| TrashError::NotFound {
                id: trash_item_id.to_string(),
            })
    }
}
