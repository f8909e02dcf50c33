use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::entity::{SplitDirection, SplitGroup, SplitLayout, SplitMember, SplitRemoval};
use super::layout::{DETACHED_SIZE, equal_share};
use crate::infrastructure::database::timestamps::utc_from_epoch_seconds_lossy;

fn row_to_group(row: &Row<'_>) -> rusqlite::Result<SplitGroup> {
    let direction: String = row.get(2)?;
    let direction = direction.parse::<SplitDirection>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(SplitGroup {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        direction,
        created_at: utc_from_epoch_seconds_lossy(row.get(3)?),
        updated_at: utc_from_epoch_seconds_lossy(row.get(4)?),
    })
}

pub(crate) fn insert_group(conn: &Connection, group: &SplitGroup) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO split_groups (id, owner_id, direction, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            group.id,
            group.owner_id,
            group.direction.as_str(),
            group.created_at.timestamp(),
            group.updated_at.timestamp(),
        ],
    )?;
    Ok(())
}

pub(crate) fn find_group(
    conn: &Connection,
    owner_id: &str,
    group_id: &str,
) -> rusqlite::Result<Option<SplitGroup>> {
    conn.query_row(
        "SELECT id, owner_id, direction, created_at, updated_at
         FROM split_groups WHERE id = ?1 AND owner_id = ?2",
        params![group_id, owner_id],
        row_to_group,
    )
    .optional()
}

pub(crate) fn list_groups(conn: &Connection, owner_id: &str) -> rusqlite::Result<Vec<SplitGroup>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_id, direction, created_at, updated_at
         FROM split_groups WHERE owner_id = ?1
         ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![owner_id], row_to_group)?;
    rows.collect()
}

pub(crate) fn members(
    conn: &Connection,
    owner_id: &str,
    group_id: &str,
) -> rusqlite::Result<Vec<SplitMember>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, split_order, split_size
         FROM sessions
         WHERE split_group_id = ?1 AND owner_id = ?2
         ORDER BY split_order ASC, created_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![group_id, owner_id], |row| {
        Ok(SplitMember {
            session_id: row.get(0)?,
            name: row.get(1)?,
            order: row.get(2)?,
            size: row.get(3)?,
        })
    })?;
    rows.collect()
}

pub(crate) fn load_layout(
    conn: &Connection,
    owner_id: &str,
    group_id: &str,
) -> rusqlite::Result<Option<SplitLayout>> {
    let Some(group) = find_group(conn, owner_id, group_id)? else {
        return Ok(None);
    };
    let members = members(conn, owner_id, group_id)?;
    Ok(Some(SplitLayout { group, members }))
}

pub(crate) fn set_membership(
    conn: &Connection,
    owner_id: &str,
    session_id: &str,
    group_id: Option<&str>,
    order: i64,
    size: f64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE sessions
         SET split_group_id = ?1, split_order = ?2, split_size = ?3, updated_at = ?4
         WHERE id = ?5 AND owner_id = ?6",
        params![
            group_id,
            order,
            size,
            Utc::now().timestamp(),
            session_id,
            owner_id
        ],
    )
}

pub(crate) fn touch_group(conn: &Connection, owner_id: &str, group_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE split_groups SET updated_at = ?1 WHERE id = ?2 AND owner_id = ?3",
        params![Utc::now().timestamp(), group_id, owner_id],
    )?;
    Ok(())
}

pub(crate) fn update_direction(
    conn: &Connection,
    owner_id: &str,
    group_id: &str,
    direction: SplitDirection,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE split_groups SET direction = ?1, updated_at = ?2 WHERE id = ?3 AND owner_id = ?4",
        params![direction.as_str(), Utc::now().timestamp(), group_id, owner_id],
    )
}

/// Gives every listed member an equal share, compacting order to `0..n`.
pub(crate) fn redistribute(
    conn: &Connection,
    owner_id: &str,
    group_id: &str,
    ordered_session_ids: &[String],
) -> rusqlite::Result<()> {
    let size = equal_share(ordered_session_ids.len());
    for (order, session_id) in ordered_session_ids.iter().enumerate() {
        set_membership(conn, owner_id, session_id, Some(group_id), order as i64, size)?;
    }
    Ok(())
}

/// Detaches `session_id` from whatever group it is in. A group left with a
/// single member is dissolved; otherwise the remaining members share the
/// space equally. Returns `None` when the session was not grouped.
/// Callers must hold a write transaction.
pub(crate) fn detach_from_split(
    conn: &Connection,
    owner_id: &str,
    session_id: &str,
) -> rusqlite::Result<Option<SplitRemoval>> {
    let group_id: Option<String> = conn
        .query_row(
            "SELECT split_group_id FROM sessions WHERE id = ?1 AND owner_id = ?2",
            params![session_id, owner_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?
        .flatten();
    let Some(group_id) = group_id else {
        return Ok(None);
    };

    set_membership(conn, owner_id, session_id, None, 0, DETACHED_SIZE)?;

    let remaining: Vec<String> = members(conn, owner_id, &group_id)?
        .into_iter()
        .map(|m| m.session_id)
        .collect();

    if remaining.len() <= 1 {
        for id in &remaining {
            set_membership(conn, owner_id, id, None, 0, DETACHED_SIZE)?;
        }
        conn.execute(
            "DELETE FROM split_groups WHERE id = ?1 AND owner_id = ?2",
            params![group_id, owner_id],
        )?;
        return Ok(Some(SplitRemoval::Dissolved {
            group_id,
            released_session_id: remaining.into_iter().next(),
        }));
    }

    redistribute(conn, owner_id, &group_id, &remaining)?;
    touch_group(conn, owner_id, &group_id)?;
    let layout = load_layout(conn, owner_id, &group_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
    Ok(Some(SplitRemoval::Redistributed { layout }))
}
