use crate::domains::settings::types::default_database_path;
use anyhow::{Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const POOL_SIZE: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(15);

// Writers queue on the lock instead of failing with SQLITE_BUSY.
fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
        row.get::<_, String>(0)
    })?;
    Ok(())
}

pub type DbConnection = PooledConnection<SqliteConnectionManager>;

#[derive(Clone)]
pub struct Database {
    pool: Arc<Pool<SqliteConnectionManager>>,
    path: PathBuf,
}

impl Database {
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = db_path.unwrap_or_else(default_database_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }

        let pool = Pool::builder()
            .max_size(POOL_SIZE)
            .build(SqliteConnectionManager::file(&path).with_init(configure_connection))
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        let db = Self {
            pool: Arc::new(pool),
            path,
        };
        super::db_schema::initialize_schema(&db)?;
        log::info!("Opened database at {}", db.path.display());
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_conn(&self) -> Result<DbConnection> {
        self.pool
            .get()
            .context("Failed to acquire database connection from pool")
    }

    /// Runs `f` inside a `BEGIN IMMEDIATE` transaction. The write lock is taken
    /// up front, so everything `f` reads stays current until commit. Returning
    /// `Err` from `f` rolls back.
    pub fn with_write_transaction<T, E>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<anyhow::Error>,
    {
        let mut conn = self.get_conn().map_err(E::from)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to begin write transaction")
            .map_err(E::from)?;
        let value = f(&tx)?;
        tx.commit()
            .context("Failed to commit write transaction")
            .map_err(E::from)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn new_creates_parent_directories_and_schema() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("dir").join("core.db");
        let db = Database::new(Some(path.clone())).unwrap();
        assert!(path.exists());

        let conn = db.get_conn().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('sessions', 'split_groups', 'trash_items', 'worktree_trash_metadata')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn pooled_connections_enforce_foreign_keys() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(Some(temp.path().join("core.db"))).unwrap();
        let conn = db.get_conn().unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn pooled_connections_use_wal_and_busy_timeout() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(Some(temp.path().join("core.db"))).unwrap();
        let conn = db.get_conn().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        let timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
        assert_eq!(timeout, BUSY_TIMEOUT.as_millis() as i64);
    }

    #[test]
    fn failed_closure_rolls_back() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(Some(temp.path().join("core.db"))).unwrap();

        let result: Result<(), anyhow::Error> = db.with_write_transaction(|tx| {
            tx.execute(
                "INSERT INTO split_groups (id, owner_id, direction, created_at, updated_at)
                 VALUES ('g1', 'u1', 'horizontal', 0, 0)",
                [],
            )?;
            Err(anyhow::anyhow!("abort"))
        });
        assert!(result.is_err());

        let conn = db.get_conn().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM split_groups", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
