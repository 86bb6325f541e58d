use super::{open_connection, schema};
use crate::ports::outbound::{TaskJournal, TaskRecord};
use crate::shared::Result;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// Task journal backed by the `task_results` table
pub struct SqliteTaskJournal {
    conn: Mutex<Connection>,
}

impl SqliteTaskJournal {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_connection(path)?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of journal rows with the given status
    pub fn count_with_status(&self, status: &str) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("task journal mutex is poisoned"))?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM task_results WHERE status = ?1",
            params![status],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl TaskJournal for SqliteTaskJournal {
    fn record(&self, record: &TaskRecord) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("task journal mutex is poisoned"))?;
        conn.execute(
            "INSERT INTO task_results
                 (task_name, arguments, lock_key, status, attempts, detail, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.task_name,
                record.arguments,
                record.lock_key,
                record.status.as_str(),
                record.attempts,
                record.detail,
                record.started_at,
                record.finished_at
            ],
        )?;
        Ok(())
    }
}
