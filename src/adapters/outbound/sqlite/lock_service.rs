use super::{open_connection, schema};
use crate::ports::outbound::{LockGuard, LockKey, LockReleaser, LockService};
use crate::shared::Result;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

struct SqliteLocks {
    conn: Mutex<Connection>,
    /// Identifies this process's rows so a release never drops another holder's key
    holder: String,
}

impl SqliteLocks {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("task lock connection mutex is poisoned"))
    }
}

impl LockReleaser for SqliteLocks {
    fn release(&self, key: &LockKey) -> Result<()> {
        self.conn()?.execute(
            "DELETE FROM task_locks WHERE lock_key = ?1 AND holder = ?2",
            params![key.as_str(), self.holder],
        )?;
        Ok(())
    }
}

/// Lock service backed by the `task_locks` table.
///
/// Every process pointed at the same database file shares the same keys.
pub struct SqliteLockService {
    locks: Arc<SqliteLocks>,
}

impl SqliteLockService {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_connection(path)?;
        schema::migrate(&conn)?;
        Ok(Self {
            locks: Arc::new(SqliteLocks {
                conn: Mutex::new(conn),
                holder: format!("{}:{}", std::process::id(), Uuid::new_v4()),
            }),
        })
    }
}

impl LockService for SqliteLockService {
    fn acquire(&self, key: &LockKey) -> Result<Option<LockGuard>> {
        let inserted = self.locks.conn()?.execute(
            "INSERT INTO task_locks (lock_key, acquired_at, holder) VALUES (?1, ?2, ?3)
             ON CONFLICT (lock_key) DO NOTHING",
            params![key.as_str(), Utc::now(), self.locks.holder],
        )?;
        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(LockGuard::new(key.clone(), self.locks.clone())))
    }

    fn clear_all(&self) -> Result<usize> {
        let cleared = self.locks.conn()?.execute("DELETE FROM task_locks", [])?;
        if cleared > 0 {
            tracing::warn!(cleared, "cleared task locks left by a previous run");
        }
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_exclusive_across_services() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locks.db");
        let first = SqliteLockService::open(&path).unwrap();
        let second = SqliteLockService::open(&path).unwrap();
        let key = LockKey::for_task("ingest_build", r#"["1","BREW"]"#);

        let guard = first.acquire(&key).unwrap();
        assert!(guard.is_some());
        assert!(second.acquire(&key).unwrap().is_none());

        drop(guard);
        assert!(second.acquire(&key).unwrap().is_some());
    }

    #[test]
    fn test_clear_all_frees_stale_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locks.db");
        let crashed = SqliteLockService::open(&path).unwrap();
        let key = LockKey::for_task("materialize", r#"["1","BREW"]"#);
        let guard = crashed.acquire(&key).unwrap();
        std::mem::forget(guard);

        let restarted = SqliteLockService::open(&path).unwrap();
        assert!(restarted.acquire(&key).unwrap().is_none());
        assert_eq!(restarted.clear_all().unwrap(), 1);
        assert!(restarted.acquire(&key).unwrap().is_some());
    }
}
