use super::connection::Database;
use super::timestamps::utc_from_epoch_seconds_lossy;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Folder {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub default_working_directory: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Local clone of a remote repository, as cached by the repository browser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryRecord {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub full_name: String,
    pub local_path: Option<PathBuf>,
}

pub trait FolderMethods {
    fn create_folder(
        &self,
        owner_id: &str,
        name: &str,
        default_working_directory: Option<&Path>,
    ) -> Result<Folder>;
    fn get_folder(&self, owner_id: &str, id: &str) -> Result<Option<Folder>>;
    fn delete_folder(&self, owner_id: &str, id: &str) -> Result<bool>;
    /// Sets the folder's local repository, replacing any previous link.
    /// Returns `false` when the folder does not belong to `owner_id`.
    fn link_folder_repository(
        &self,
        owner_id: &str,
        folder_id: &str,
        local_repo_path: &Path,
    ) -> Result<bool>;
    fn folder_repository_path(&self, owner_id: &str, folder_id: &str) -> Result<Option<PathBuf>>;
    fn register_repository(&self, repository: &RepositoryRecord) -> Result<()>;
    fn get_repository(&self, owner_id: &str, id: &str) -> Result<Option<RepositoryRecord>>;
}

impl FolderMethods for Database {
    fn create_folder(
        &self,
        owner_id: &str,
        name: &str,
        default_working_directory: Option<&Path>,
    ) -> Result<Folder> {
        let conn = self.get_conn()?;
        let now = Utc::now().timestamp();
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO folders (id, owner_id, name, default_working_directory, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                owner_id,
                name,
                default_working_directory.map(|p| p.to_string_lossy().to_string()),
                now,
                now,
            ],
        )?;
        Ok(Folder {
            id,
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            default_working_directory: default_working_directory.map(Path::to_path_buf),
            created_at: utc_from_epoch_seconds_lossy(now),
            updated_at: utc_from_epoch_seconds_lossy(now),
        })
    }

    fn get_folder(&self, owner_id: &str, id: &str) -> Result<Option<Folder>> {
        let conn = self.get_conn()?;
        let folder = conn
            .query_row(
                "SELECT id, owner_id, name, default_working_directory, created_at, updated_at
                 FROM folders
                 WHERE id = ?1 AND owner_id = ?2",
                params![id, owner_id],
                row_to_folder,
            )
            .optional()?;
        Ok(folder)
    }

    fn delete_folder(&self, owner_id: &str, id: &str) -> Result<bool> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "DELETE FROM folders WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )?;
        Ok(changed > 0)
    }

    fn link_folder_repository(
        &self,
        owner_id: &str,
        folder_id: &str,
        local_repo_path: &Path,
    ) -> Result<bool> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "INSERT INTO folder_repositories (folder_id, owner_id, local_repo_path, updated_at)
             SELECT ?1, ?2, ?3, ?4
             WHERE EXISTS (SELECT 1 FROM folders WHERE id = ?1 AND owner_id = ?2)
             ON CONFLICT(folder_id) DO UPDATE SET
                local_repo_path = excluded.local_repo_path,
                updated_at = excluded.updated_at",
            params![
                folder_id,
                owner_id,
                local_repo_path.to_string_lossy(),
                Utc::now().timestamp(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn folder_repository_path(&self, owner_id: &str, folder_id: &str) -> Result<Option<PathBuf>> {
        let conn = self.get_conn()?;
        let path: Option<String> = conn
            .query_row(
                "SELECT local_repo_path FROM folder_repositories
                 WHERE folder_id = ?1 AND owner_id = ?2",
                params![folder_id, owner_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(path.map(PathBuf::from))
    }

    fn register_repository(&self, repository: &RepositoryRecord) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO repositories (id, owner_id, name, full_name, local_path, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                full_name = excluded.full_name,
                local_path = excluded.local_path,
                updated_at = excluded.updated_at
             WHERE repositories.owner_id = excluded.owner_id",
            params![
                repository.id,
                repository.owner_id,
                repository.name,
                repository.full_name,
                repository
                    .local_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string()),
                Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    fn get_repository(&self, owner_id: &str, id: &str) -> Result<Option<RepositoryRecord>> {
        let conn = self.get_conn()?;
        let repository = conn
            .query_row(
                "SELECT id, owner_id, name, full_name, local_path
                 FROM repositories
                 WHERE id = ?1 AND owner_id = ?2",
                params![id, owner_id],
                |row| {
                    Ok(RepositoryRecord {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        name: row.get(2)?,
                        full_name: row.get(3)?,
                        local_path: row.get::<_, Option<String>>(4)?.map(PathBuf::from),
                    })
                },
            )
            .optional()?;
        Ok(repository)
    }
}

fn row_to_folder(row: &Row<'_>) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        default_working_directory: row.get::<_, Option<String>>(3)?.map(PathBuf::from),
        created_at: utc_from_epoch_seconds_lossy(row.get(4)?),
        updated_at: utc_from_epoch_seconds_lossy(row.get(5)?),
    })
}
