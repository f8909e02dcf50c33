use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::path::PathBuf;

use super::entity::{Session, SessionStatus};
use crate::infrastructure::database::Database;
use crate::infrastructure::database::timestamps::utc_from_epoch_seconds_lossy;

pub(crate) const SESSION_COLUMNS: &str = "id, owner_id, name, handle_name, working_directory,
    repository_id, worktree_branch, folder_id, split_group_id, split_order, split_size,
    status, tab_order, last_activity_at, created_at, updated_at";

pub(crate) fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    let status: String = row.get(11)?;
    let status = status.parse::<SessionStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(Session {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        handle_name: row.get(3)?,
        working_directory: row.get::<_, Option<String>>(4)?.map(PathBuf::from),
        repository_id: row.get(5)?,
        worktree_branch: row.get(6)?,
        folder_id: row.get(7)?,
        split_group_id: row.get(8)?,
        split_order: row.get(9)?,
        split_size: row.get(10)?,
        status,
        tab_order: row.get(12)?,
        last_activity_at: utc_from_epoch_seconds_lossy(row.get(13)?),
        created_at: utc_from_epoch_seconds_lossy(row.get(14)?),
        updated_at: utc_from_epoch_seconds_lossy(row.get(15)?),
    })
}

/// Owner-scoped lookup usable both on a plain connection and inside a
/// transaction.
pub(crate) fn find_session(
    conn: &Connection,
    owner_id: &str,
    id: &str,
) -> rusqlite::Result<Option<Session>> {
    conn.query_row(
        &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1 AND owner_id = ?2"),
        params![id, owner_id],
        row_to_session,
    )
    .optional()
}

pub(crate) fn folder_is_owned(
    conn: &Connection,
    owner_id: &str,
    folder_id: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM folders WHERE id = ?1 AND owner_id = ?2)",
        params![folder_id, owner_id],
        |row| row.get(0),
    )
}

/// Inserts `session`, assigning it the next tab position for its owner.
/// Must run inside a write transaction so concurrent creates never share a
/// position.
pub(crate) fn insert_session(conn: &Connection, session: &mut Session) -> rusqlite::Result<()> {
    let next_tab: i64 = conn.query_row(
        "SELECT COALESCE(MAX(tab_order), -1) + 1 FROM sessions WHERE owner_id = ?1",
        params![session.owner_id],
        |row| row.get(0),
    )?;
    session.tab_order = next_tab;
    conn.execute(
        &format!(
            "INSERT INTO sessions ({SESSION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        ),
        params![
            session.id,
            session.owner_id,
            session.name,
            session.handle_name,
            session
                .working_directory
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            session.repository_id,
            session.worktree_branch,
            session.folder_id,
            session.split_group_id,
            session.split_order,
            session.split_size,
            session.status.as_str(),
            session.tab_order,
            session.last_activity_at.timestamp(),
            session.created_at.timestamp(),
            session.updated_at.timestamp(),
        ],
    )?;
    Ok(())
}

pub(crate) fn update_status(
    conn: &Connection,
    owner_id: &str,
    id: &str,
    status: SessionStatus,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE sessions SET status = ?1, updated_at = ?2 WHERE id = ?3 AND owner_id = ?4",
        params![status.as_str(), Utc::now().timestamp(), id, owner_id],
    )
}

pub(crate) fn delete_session(conn: &Connection, owner_id: &str, id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM sessions WHERE id = ?1 AND owner_id = ?2",
        params![id, owner_id],
    )
}

pub trait SessionMethods {
    fn get_session(&self, owner_id: &str, id: &str) -> Result<Option<Session>>;
    fn list_sessions(&self, owner_id: &str, statuses: &[SessionStatus]) -> Result<Vec<Session>>;
    fn touch_session_activity(&self, owner_id: &str, id: &str) -> Result<bool>;
}

impl SessionMethods for Database {
    fn get_session(&self, owner_id: &str, id: &str) -> Result<Option<Session>> {
        let conn = self.get_conn()?;
        Ok(find_session(&conn, owner_id, id)?)
    }

    fn list_sessions(&self, owner_id: &str, statuses: &[SessionStatus]) -> Result<Vec<Session>> {
        let conn = self.get_conn()?;
        let mut sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE owner_id = ?1");
        if !statuses.is_empty() {
            let placeholders: Vec<String> =
                (0..statuses.len()).map(|i| format!("?{}", i + 2)).collect();
            sql.push_str(&format!(" AND status IN ({})", placeholders.join(", ")));
        }
        sql.push_str(" ORDER BY tab_order ASC, created_at ASC");

        let mut values: Vec<String> = vec![owner_id.to_string()];
        values.extend(statuses.iter().map(|s| s.as_str().to_string()));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), row_to_session)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    fn touch_session_activity(&self, owner_id: &str, id: &str) -> Result<bool> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE sessions SET last_activity_at = ?1 WHERE id = ?2 AND owner_id = ?3",
            params![Utc::now().timestamp(), id, owner_id],
        )?;
        Ok(changed == 1)
    }
}
