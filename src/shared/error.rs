use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the CLI application.
///
/// These codes allow schedulers and CI jobs to distinguish between a run
/// where some tasks failed and a run that could not start at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success - every submitted task succeeded, was skipped or deduplicated
    Success = 0,
    /// At least one task failed after exhausting its retries
    TaskFailures = 1,
    /// Invalid command-line arguments (clap parsing errors)
    InvalidArguments = 2,
    /// Application error (database error, file I/O error, invalid config, etc.)
    ApplicationError = 3,
}

impl ExitCode {
    /// Convert to i32 for use with std::process::exit
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCode::Success => write!(f, "Success (0)"),
            ExitCode::TaskFailures => write!(f, "Task Failures (1)"),
            ExitCode::InvalidArguments => write!(f, "Invalid Arguments (2)"),
            ExitCode::ApplicationError => write!(f, "Application Error (3)"),
        }
    }
}

/// Application-specific errors for the registry.
///
/// The variants map onto four handling classes:
/// transient (retried by the scheduler), data-shape (subtree skipped),
/// integrity (subtree aborted) and everything else (task failed).
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Node integrity violation: cached identity '{expected}' does not match payload identity '{found}'\n\n💡 Hint: The payload changed after the node was written; re-ingest the build with --force")]
    NodeIntegrity { expected: String, found: String },

    #[error("Node conflict: a {kind} node with identity '{identity}' already exists under the target parent")]
    NodeConflict { kind: String, identity: String },

    #[error("Invalid move of node {node_id}: {reason}")]
    InvalidMove { node_id: i64, reason: String },

    #[error("{entity} not found: {key}\n\n💡 Hint: {hint}")]
    NotFound {
        entity: &'static str,
        key: String,
        hint: String,
    },

    #[error("Unsupported component type: '{token}'")]
    UnsupportedComponentType { token: String },

    #[error("Unsupported build type: '{token}'")]
    UnsupportedBuildType { token: String },

    #[error("Missing required field '{field}' in {context}")]
    MissingField { field: &'static str, context: String },

    /// Validation error for record and argument parsing
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Build metadata source unavailable: {details}\n\n💡 Hint: The collector output could not be read; the task will be retried")]
    SourceUnavailable { details: String },

    #[error("Failed to read file: {path}\nDetails: {details}\n\n💡 Hint: Please verify that the file exists and you have read permissions")]
    FileReadError { path: PathBuf, details: String },

    #[error("Failed to write to file: {path}\nDetails: {details}\n\n💡 Hint: Please verify that the directory exists and you have write permissions")]
    FileWriteError { path: PathBuf, details: String },
}

impl RegistryError {
    /// Whether retrying the same operation later can succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RegistryError::Storage(err) => is_transient_sqlite(err),
            RegistryError::SourceUnavailable { .. } => true,
            _ => false,
        }
    }

    /// Whether the error describes malformed input that only affects one subtree
    pub fn is_data_shape(&self) -> bool {
        matches!(
            self,
            RegistryError::UnsupportedComponentType { .. }
                | RegistryError::MissingField { .. }
                | RegistryError::InvalidInput { .. }
        )
    }
}

fn is_transient_sqlite(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
    )
}

/// Walks an error chain and reports whether any link is transient.
pub fn is_transient_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(registry) = cause.downcast_ref::<RegistryError>() {
            return registry.is_transient();
        }
        if let Some(sqlite) = cause.downcast_ref::<rusqlite::Error>() {
            return is_transient_sqlite(sqlite);
        }
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
            );
        }
        false
    })
}

/// Whether an error should skip the current subtree instead of failing the build.
pub fn is_subtree_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.downcast_ref::<RegistryError>().is_some_and(|registry| {
            registry.is_data_shape() || matches!(registry, RegistryError::NodeIntegrity { .. })
        })
    })
}
