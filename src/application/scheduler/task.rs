use crate::ports::outbound::LockKey;
use crate::taxonomy::domain::BuildKey;
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// One unit of work for the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Fetch a build's collector output and build its component tree
    IngestBuild { key: BuildKey, force: bool },
    /// Derive product links for every component of a build
    Materialize { key: BuildKey },
    /// Load a product definition file into the product tree
    LoadProducts { path: PathBuf },
    /// Load evidence records, optionally deriving brew tag evidence too
    LoadRelations {
        path: PathBuf,
        tag_builds: Option<PathBuf>,
    },
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::IngestBuild { .. } => "ingest_build",
            Task::Materialize { .. } => "materialize",
            Task::LoadProducts { .. } => "load_products",
            Task::LoadRelations { .. } => "load_relations",
        }
    }

    /// Arguments that identify the work, as a JSON array.
    ///
    /// `force` is left out: a forced and an unforced ingest of one build
    /// must not run at the same time.
    pub fn canonical_args(&self) -> String {
        let args = match self {
            Task::IngestBuild { key, .. } | Task::Materialize { key } => {
                json!([key.build_id, key.build_type.as_str()])
            }
            Task::LoadProducts { path } => json!([path.display().to_string()]),
            Task::LoadRelations { path, tag_builds } => json!([
                path.display().to_string(),
                tag_builds.as_ref().map(|p| p.display().to_string())
            ]),
        };
        args.to_string()
    }

    pub fn lock_key(&self) -> LockKey {
        LockKey::for_task(self.name(), &self.canonical_args())
    }

    /// Whether a submission that finds its key held must still run after
    /// the holder, instead of being dropped as a duplicate.
    ///
    /// A materialization may have started before the tree or the evidence
    /// it reads was complete.
    pub fn reruns_when_held(&self) -> bool {
        matches!(self, Task::Materialize { .. })
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::IngestBuild { key, force: true } => write!(f, "ingest_build({}, force)", key),
            Task::IngestBuild { key, .. } | Task::Materialize { key } => {
                write!(f, "{}({})", self.name(), key)
            }
            Task::LoadProducts { path } => write!(f, "load_products({})", path.display()),
            Task::LoadRelations { path, .. } => write!(f, "load_relations({})", path.display()),
        }
    }
}

/// A task to submit once the current one finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUp {
    pub task: Task,
    pub delay: Duration,
}

/// What a handler reports for a finished task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub summary: String,
    /// The task was a deliberate no-op
    pub skipped: bool,
    pub follow_ups: Vec<FollowUp>,
}

impl TaskResult {
    pub fn done(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            skipped: false,
            follow_ups: Vec::new(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            summary: reason.into(),
            skipped: true,
            follow_ups: Vec::new(),
        }
    }

    pub fn then(mut self, task: Task, delay: Duration) -> Self {
        self.follow_ups.push(FollowUp { task, delay });
        self
    }
}

/// Final outcome of one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded { summary: String, attempts: u32 },
    Skipped { reason: String },
    /// Another holder had the task's key; nothing ran
    Duplicate,
    /// Another holder had the task's key; the task runs again once it is released
    Deferred,
    /// Failed after `attempts` tries; `error` is the full error chain
    Failed { error: String, attempts: u32 },
}

impl TaskOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskOutcome::Failed { .. })
    }
}
