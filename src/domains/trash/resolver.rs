use log::debug;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::domains::git::WorktreeManager;
use crate::domains::sessions::Session;
use crate::infrastructure::database::{Database, FolderMethods};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositorySource {
    FolderLink,
    FolderDirectory,
    CachedRepository,
    WorktreeLayout,
    WorktreeParent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRepository {
    pub path: PathBuf,
    pub name: String,
    pub repository_id: Option<String>,
    pub source: RepositorySource,
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Finds the repository a worktree-backed session belongs to. Sources are
/// tried from most to least explicit; the worktree's parent directory is the
/// last resort, so this only returns `None` for a worktree at the filesystem
/// root.
pub(crate) async fn resolve_repository(
    db: &Database,
    worktrees: &WorktreeManager,
    session: &Session,
    worktree_path: &Path,
) -> anyhow::Result<Option<ResolvedRepository>> {
    let owner_id = session.owner_id.as_str();
    let cached = match &session.repository_id {
        Some(id) => db.get_repository(owner_id, id)?,
        None => None,
    };
    let repository_id = cached.as_ref().map(|r| r.id.clone());
    let display_name = |path: &Path| {
        cached
            .as_ref()
            .map(|r| r.name.clone())
            .unwrap_or_else(|| name_of(path))
    };
    let resolved = |path: PathBuf, source: RepositorySource| {
        debug!(
            "Resolved repository for session {} via {source:?}: {}",
            session.id,
            path.display()
        );
        Some(ResolvedRepository {
            name: display_name(&path),
            path,
            repository_id: repository_id.clone(),
            source,
        })
    };

    if let Some(folder_id) = &session.folder_id {
        if let Some(path) = db.folder_repository_path(owner_id, folder_id)? {
            return Ok(resolved(path, RepositorySource::FolderLink));
        }
        if let Some(dir) = db
            .get_folder(owner_id, folder_id)?
            .and_then(|f| f.default_working_directory)
            && worktrees.is_repository(&dir).await
        {
            return Ok(resolved(dir, RepositorySource::FolderDirectory));
        }
    }

    if let Some(path) = cached.as_ref().and_then(|r| r.local_path.clone()) {
        return Ok(resolved(path, RepositorySource::CachedRepository));
    }

    if let Some(path) = worktrees.infer_repository_path(worktree_path)
        && path.is_dir()
    {
        return Ok(resolved(path, RepositorySource::WorktreeLayout));
    }

    Ok(worktree_path
        .parent()
        .and_then(|parent| resolved(parent.to_path_buf(), RepositorySource::WorktreeParent)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::sessions::{SessionStatus, entity::DEFAULT_SPLIT_SIZE};
    use crate::infrastructure::database::RepositoryRecord;
    use crate::test_support::{FakeVcs, fake_repo, test_db};
    use chrono::Utc;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn session(worktree: &Path, folder_id: Option<String>, repository_id: Option<String>) -> Session {
        let now = Utc::now();
        Session {
            id: "s1".to_string(),
            owner_id: "alice".to_string(),
            name: "s1".to_string(),
            handle_name: "tw-s1".to_string(),
            working_directory: Some(worktree.to_path_buf()),
            repository_id,
            worktree_branch: Some("feature-x".to_string()),
            folder_id,
            split_group_id: None,
            split_order: 0,
            split_size: DEFAULT_SPLIT_SIZE,
            status: SessionStatus::Active,
            tab_order: 0,
            last_activity_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    fn manager() -> WorktreeManager {
        WorktreeManager::new(Arc::new(FakeVcs::default()), "-worktrees")
    }

    #[tokio::test]
    async fn explicit_folder_link_wins() {
        let temp = TempDir::new().unwrap();
        let db = test_db(&temp);
        let linked = fake_repo(temp.path(), "linked");
        let folder = db.create_folder("alice", "work", None).unwrap();
        db.link_folder_repository("alice", &folder.id, &linked).unwrap();

        let wt = temp.path().join("app-worktrees").join("feature-x");
        let s = session(&wt, Some(folder.id), None);
        let resolved = resolve_repository(&db, &manager(), &s, &wt)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.path, linked);
        assert_eq!(resolved.source, RepositorySource::FolderLink);
        assert_eq!(resolved.name, "linked");
    }

    #[tokio::test]
    async fn folder_directory_must_be_a_repository() {
        let temp = TempDir::new().unwrap();
        let db = test_db(&temp);
        let plain_dir = temp.path().join("notes");
        std::fs::create_dir_all(&plain_dir).unwrap();
        let folder = db.create_folder("alice", "notes", Some(&plain_dir)).unwrap();

        let wt = temp.path().join("scratch").join("feature-x");
        let s = session(&wt, Some(folder.id), None);
        let resolved = resolve_repository(&db, &manager(), &s, &wt)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.source, RepositorySource::WorktreeParent);
        assert_eq!(resolved.path, temp.path().join("scratch"));

        let repo = fake_repo(temp.path(), "code");
        let folder = db.create_folder("alice", "code", Some(&repo)).unwrap();
        let s = session(&wt, Some(folder.id), None);
        let resolved = resolve_repository(&db, &manager(), &s, &wt)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.source, RepositorySource::FolderDirectory);
        assert_eq!(resolved.path, repo);
    }

    #[tokio::test]
    async fn cached_repository_then_layout_guess() {
        let temp = TempDir::new().unwrap();
        let db = test_db(&temp);
        let clone = fake_repo(temp.path(), "clone");
        db.register_repository(&RepositoryRecord {
            id: "gh-1".to_string(),
            owner_id: "alice".to_string(),
            name: "widgets".to_string(),
            full_name: "acme/widgets".to_string(),
            local_path: Some(clone.clone()),
        })
        .unwrap();

        let app = fake_repo(temp.path(), "app");
        let wt = temp.path().join("app-worktrees").join("feature-x");

        let s = session(&wt, None, Some("gh-1".to_string()));
        let resolved = resolve_repository(&db, &manager(), &s, &wt)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.path, clone);
        assert_eq!(resolved.name, "widgets");
        assert_eq!(resolved.repository_id.as_deref(), Some("gh-1"));

        let s = session(&wt, None, None);
        let resolved = resolve_repository(&db, &manager(), &s, &wt)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.path, app);
        assert_eq!(resolved.source, RepositorySource::WorktreeLayout);
    }
}
