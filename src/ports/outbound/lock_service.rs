use crate::shared::Result;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Lock key: hex SHA-256 of a task name and its canonical arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey(String);

impl LockKey {
    pub fn for_task(name: &str, canonical_args: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical_args.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Releases a held key; implemented by each lock backend
pub trait LockReleaser: Send + Sync {
    fn release(&self, key: &LockKey) -> Result<()>;
}

/// Scoped ownership of a lock key.
///
/// The key is released when the guard is dropped, whether the task
/// succeeded, failed or panicked.
pub struct LockGuard {
    key: LockKey,
    releaser: Arc<dyn LockReleaser>,
}

impl LockGuard {
    pub fn new(key: LockKey, releaser: Arc<dyn LockReleaser>) -> Self {
        Self { key, releaser }
    }

    pub fn key(&self) -> &LockKey {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(err) = self.releaser.release(&self.key) {
            tracing::warn!(key = %self.key, error = %err, "failed to release task lock");
        }
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("key", &self.key).finish()
    }
}

/// LockService port - at most one holder per key
pub trait LockService: Send + Sync {
    /// Takes the key if it is free.
    ///
    /// # Returns
    /// `Some(guard)` when the caller now holds the key, `None` when another
    /// holder has it.
    fn acquire(&self, key: &LockKey) -> Result<Option<LockGuard>>;

    /// Drops every held key; run when a worker pool starts so a crashed
    /// holder cannot block its key forever
    fn clear_all(&self) -> Result<usize>;
}
