use crate::shared::Result;
use chrono::{DateTime, Utc};
use std::fmt;

/// Final state of one task submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Succeeded,
    Skipped,
    Duplicate,
    Deferred,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Succeeded => "SUCCEEDED",
            TaskStatus::Skipped => "SKIPPED",
            TaskStatus::Duplicate => "DUPLICATE",
            TaskStatus::Deferred => "DEFERRED",
            TaskStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the task journal
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub task_name: String,
    pub arguments: String,
    pub lock_key: String,
    pub status: TaskStatus,
    pub attempts: u32,
    /// Summary on success, skip reason, or the full error chain on failure
    pub detail: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// TaskJournal port for recording task outcomes
pub trait TaskJournal: Send + Sync {
    fn record(&self, record: &TaskRecord) -> Result<()>;
}
