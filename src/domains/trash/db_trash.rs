use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::PathBuf;

use super::entity::{TrashItem, WorktreeTrashMetadata};
use crate::infrastructure::database::Database;
use crate::infrastructure::database::timestamps::utc_from_epoch_millis_lossy;

const ITEM_SELECT: &str = "SELECT t.id, t.owner_id, t.resource_type, t.resource_id, t.resource_name,
            t.trashed_at, t.expires_at,
            m.trash_item_id, m.repository_id, m.repository_name, m.repository_local_path,
            m.original_path, m.trash_path, m.original_branch,
            m.original_folder_id, m.original_folder_name
     FROM trash_items t
     LEFT JOIN worktree_trash_metadata m ON m.trash_item_id = t.id";

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<TrashItem> {
    let has_metadata: Option<String> = row.get(7)?;
    let metadata = match has_metadata {
        Some(_) => Some(WorktreeTrashMetadata {
            repository_id: row.get(8)?,
            repository_name: row.get(9)?,
            repository_local_path: PathBuf::from(row.get::<_, String>(10)?),
            original_path: PathBuf::from(row.get::<_, String>(11)?),
            trash_path: PathBuf::from(row.get::<_, String>(12)?),
            original_branch: row.get(13)?,
            original_folder_id: row.get(14)?,
            original_folder_name: row.get(15)?,
        }),
        None => None,
    };
    Ok(TrashItem {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        resource_type: row.get(2)?,
        resource_id: row.get(3)?,
        resource_name: row.get(4)?,
        trashed_at: utc_from_epoch_millis_lossy(row.get(5)?),
        expires_at: utc_from_epoch_millis_lossy(row.get(6)?),
        metadata,
    })
}

pub(crate) fn insert_trash_item(conn: &Connection, item: &TrashItem) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO trash_items (
            id, owner_id, resource_type, resource_id, resource_name, trashed_at, expires_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            item.id,
            item.owner_id,
            item.resource_type,
            item.resource_id,
            item.resource_name,
            item.trashed_at.timestamp_millis(),
            item.expires_at.timestamp_millis(),
        ],
    )?;

    if let Some(meta) = &item.metadata {
        conn.execute(
            "INSERT INTO worktree_trash_metadata (
                trash_item_id, repository_id, repository_name, repository_local_path,
                original_path, trash_path, original_branch,
                original_folder_id, original_folder_name
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                item.id,
                meta.repository_id,
                meta.repository_name,
                meta.repository_local_path.to_string_lossy(),
                meta.original_path.to_string_lossy(),
                meta.trash_path.to_string_lossy(),
                meta.original_branch,
                meta.original_folder_id,
                meta.original_folder_name,
            ],
        )?;
    }
    Ok(())
}

pub(crate) fn find_trash_item(
    conn: &Connection,
    owner_id: &str,
    id: &str,
) -> rusqlite::Result<Option<TrashItem>> {
    conn.query_row(
        &format!("{ITEM_SELECT} WHERE t.id = ?1 AND t.owner_id = ?2"),
        params![id, owner_id],
        row_to_item,
    )
    .optional()
}

/// Deletes the item; its metadata row goes with it through the cascade.
pub(crate) fn delete_trash_item(
    conn: &Connection,
    owner_id: &str,
    id: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM trash_items WHERE id = ?1 AND owner_id = ?2",
        params![id, owner_id],
    )
}

pub trait TrashMethods {
    fn get_trash_item(&self, owner_id: &str, id: &str) -> Result<Option<TrashItem>>;
    fn list_trash_items(&self, owner_id: &str) -> Result<Vec<TrashItem>>;
    /// Items of every owner whose retention ran out before `now_millis`.
    fn list_expired_trash_items(&self, now_millis: i64) -> Result<Vec<TrashItem>>;
}

impl TrashMethods for Database {
    fn get_trash_item(&self, owner_id: &str, id: &str) -> Result<Option<TrashItem>> {
        let conn = self.get_conn()?;
        Ok(find_trash_item(&conn, owner_id, id)?)
    }

    fn list_trash_items(&self, owner_id: &str) -> Result<Vec<TrashItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{ITEM_SELECT} WHERE t.owner_id = ?1 ORDER BY t.trashed_at DESC, t.rowid DESC"
        ))?;
        let rows = stmt.query_map(params![owner_id], row_to_item)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    fn list_expired_trash_items(&self, now_millis: i64) -> Result<Vec<TrashItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{ITEM_SELECT} WHERE t.expires_at < ?1 ORDER BY t.expires_at ASC"
        ))?;
        let rows = stmt.query_map(params![now_millis], row_to_item)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }
}
