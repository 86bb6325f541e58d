//! SQLite storage for the registry.
//!
//! One [`SqliteRegistry`] wraps one connection; workers each open their own.
//! Writers serialize through `BEGIN IMMEDIATE` transactions, and WAL mode
//! lets readers proceed while a writer holds the lock.

mod component_store;
mod lock_service;
mod manifest_store;
mod node_store;
mod product_store;
mod relation_store;
pub(crate) mod schema;
mod task_journal;
mod taxonomy_store;

pub use lock_service::SqliteLockService;
pub use task_journal::SqliteTaskJournal;

use crate::shared::error::RegistryError;
use crate::shared::Result;
use anyhow::Context;
use rusqlite::types::Type;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// How long a connection waits on a locked database before reporting BUSY
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SqliteRegistry {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteRegistry {
    /// Opens (or creates) a database file and applies the schema
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_connection(path)?;
        schema::migrate(&conn).context("Failed to apply database schema")?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::migrate(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// Database file backing this registry, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Starts a writer transaction that takes the database lock up front.
    ///
    /// Taking the lock at BEGIN instead of at the first write keeps two
    /// writers from both reading a parent's position and then colliding.
    pub(crate) fn immediate(&self) -> rusqlite::Result<Transaction<'_>> {
        Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
    }
}

/// Opens a connection with the pragmas every registry connection needs
pub(crate) fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(journal_mode = %mode, "database is not in WAL mode");
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

pub(crate) fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

pub(crate) fn parse_uuid(column: usize, raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| conversion_error(column, format!("invalid uuid '{}': {}", raw, e)))
}

pub(crate) fn parse_meta(column: usize, raw: &str) -> rusqlite::Result<Map<String, Value>> {
    serde_json::from_str(raw)
        .map_err(|e| conversion_error(column, format!("invalid meta_attr JSON: {}", e)))
}

pub(crate) fn meta_to_sql(meta: &Map<String, Value>) -> Result<String> {
    Ok(serde_json::to_string(meta)?)
}

/// Maps a UNIQUE violation to `NodeConflict`, passing other errors through
pub(crate) fn conflict_or(err: rusqlite::Error, kind: &str, identity: &str) -> anyhow::Error {
    if err.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) {
        RegistryError::NodeConflict {
            kind: kind.to_string(),
            identity: identity.to_string(),
        }
        .into()
    } else {
        RegistryError::Storage(err).into()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_file_database_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");
        let registry = SqliteRegistry::open(&path).unwrap();

        let mode: String = registry
            .conn()
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert_eq!(registry.path(), Some(path.as_path()));
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");
        {
            let registry = SqliteRegistry::open(&path).unwrap();
            registry
                .conn()
                .execute(
                    "INSERT INTO software_builds (build_id, build_type) VALUES ('1', 'BREW')",
                    [],
                )
                .unwrap();
        }
        let registry = SqliteRegistry::open(&path).unwrap();
        let count: i64 = registry
            .conn()
            .query_row("SELECT COUNT(*) FROM software_builds", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
