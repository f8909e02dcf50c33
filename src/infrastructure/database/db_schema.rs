use super::connection::Database;

pub fn initialize_schema(db: &Database) -> anyhow::Result<()> {
    let conn = db.get_conn()?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS folders (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            default_working_directory TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_folders_owner ON folders(owner_id)",
        [],
    )?;

    // Explicit "this folder's code lives in this local repository" preference.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS folder_repositories (
            folder_id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            local_repo_path TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY(folder_id) REFERENCES folders(id) ON DELETE CASCADE
        )",
        [],
    )?;

    // Cached clones of remote (GitHub) repositories.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS repositories (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            full_name TEXT NOT NULL,
            local_path TEXT,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS split_groups (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            direction TEXT NOT NULL CHECK (direction IN ('horizontal', 'vertical')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_split_groups_owner ON split_groups(owner_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            handle_name TEXT NOT NULL UNIQUE,
            working_directory TEXT,
            repository_id TEXT,
            worktree_branch TEXT,
            folder_id TEXT,
            split_group_id TEXT,
            split_order INTEGER NOT NULL DEFAULT 0,
            split_size REAL NOT NULL DEFAULT 0.5,
            status TEXT NOT NULL,  -- 'active', 'suspended', 'closed' or 'trashed'
            tab_order INTEGER NOT NULL DEFAULT 0,
            last_activity_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY(folder_id) REFERENCES folders(id) ON DELETE SET NULL,
            FOREIGN KEY(split_group_id) REFERENCES split_groups(id) ON DELETE SET NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_owner_status ON sessions(owner_id, status)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_split_group ON sessions(split_group_id, split_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS trash_items (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            resource_name TEXT NOT NULL,
            trashed_at INTEGER NOT NULL,  -- epoch millis
            expires_at INTEGER NOT NULL,  -- epoch millis
            UNIQUE(resource_type, resource_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_trash_items_owner ON trash_items(owner_id, trashed_at DESC)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_trash_items_expires ON trash_items(expires_at)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS worktree_trash_metadata (
            trash_item_id TEXT PRIMARY KEY,
            repository_id TEXT,
            repository_name TEXT NOT NULL,
            repository_local_path TEXT NOT NULL,
            original_path TEXT NOT NULL,
            trash_path TEXT NOT NULL,
            original_branch TEXT NOT NULL,
            original_folder_id TEXT,
            original_folder_name TEXT,
            FOREIGN KEY(trash_item_id) REFERENCES trash_items(id) ON DELETE CASCADE
        )",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn schema_initialization_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(Some(temp.path().join("core.db"))).unwrap();
        initialize_schema(&db).unwrap();
        initialize_schema(&db).unwrap();
    }

    #[test]
    fn sessions_table_is_created_with_activity_column() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(Some(temp.path().join("core.db"))).unwrap();
        initialize_schema(&db).unwrap();
        let conn = db.get_conn().unwrap();

        let (not_null, default): (i64, Option<String>) = conn
            .query_row(
                "SELECT \"notnull\", dflt_value FROM pragma_table_info('sessions') WHERE name = 'last_activity_at'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(not_null, 1);
        assert_eq!(default, None);
    }

    #[test]
    fn deleting_trash_item_cascades_to_metadata() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(Some(temp.path().join("core.db"))).unwrap();
        let conn = db.get_conn().unwrap();

        conn.execute(
            "INSERT INTO trash_items (id, owner_id, resource_type, resource_id, resource_name, trashed_at, expires_at)
             VALUES ('t1', 'u1', 'worktree', 's1', 'label', 0, 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO worktree_trash_metadata (trash_item_id, repository_name, repository_local_path, original_path, trash_path, original_branch)
             VALUES ('t1', 'repo', '/repo', '/wt', '/repo/.trash/wt-0', 'feature/x')",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM trash_items WHERE id = 't1'", [])
            .unwrap();

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM worktree_trash_metadata", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
