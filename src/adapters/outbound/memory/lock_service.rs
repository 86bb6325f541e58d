use crate::ports::outbound::{LockGuard, LockKey, LockReleaser, LockService};
use crate::shared::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
struct HeldKeys {
    keys: DashMap<LockKey, DateTime<Utc>>,
}

impl LockReleaser for HeldKeys {
    fn release(&self, key: &LockKey) -> Result<()> {
        self.keys.remove(key);
        Ok(())
    }
}

/// In-process lock service for a single worker pool
#[derive(Default, Clone)]
pub struct InMemoryLockService {
    held: Arc<HeldKeys>,
}

impl InMemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held_count(&self) -> usize {
        self.held.keys.len()
    }
}

impl LockService for InMemoryLockService {
    fn acquire(&self, key: &LockKey) -> Result<Option<LockGuard>> {
        // The entry API holds the shard lock, so check-and-insert is atomic
        match self.held.keys.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(None),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                Ok(Some(LockGuard::new(key.clone(), self.held.clone())))
            }
        }
    }

    fn clear_all(&self) -> Result<usize> {
        let cleared = self.held.keys.len();
        self.held.keys.clear();
        Ok(cleared)
    }
}
