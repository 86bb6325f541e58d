use async_trait::async_trait;
use component_registry::prelude::*;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Mock BuildMetadataSource serving records from memory.
///
/// The first `unavailable_times` fetches fail with a transient error.
#[derive(Default, Clone)]
pub struct MockBuildSource {
    records: Arc<DashMap<BuildKey, BuildRecord>>,
    unavailable_times: Arc<AtomicU32>,
    fetches: Arc<AtomicU32>,
}

impl MockBuildSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_build(self, json: &str) -> Self {
        let record: BuildRecord = serde_json::from_str(json).unwrap();
        let build_type = record.build_meta.build_type.parse().unwrap();
        let key = BuildKey::new(record.build_meta.build_id.clone(), build_type);
        self.records.insert(key, record);
        self
    }

    pub fn unavailable_for(self, times: u32) -> Self {
        self.unavailable_times.store(times, Ordering::SeqCst);
        self
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildMetadataSource for MockBuildSource {
    async fn fetch_build(&self, key: &BuildKey) -> Result<BuildRecord> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let remaining = self.unavailable_times.load(Ordering::SeqCst);
        if remaining > 0 {
            self.unavailable_times.store(remaining - 1, Ordering::SeqCst);
            return Err(RegistryError::SourceUnavailable {
                details: format!("collector for {} timed out", key),
            }
            .into());
        }
        self.records
            .get(key)
            .map(|record| record.clone())
            .ok_or_else(|| {
                RegistryError::NotFound {
                    entity: "Build",
                    key: key.to_string(),
                    hint: "The mock source has no record for this build".to_string(),
                }
                .into()
            })
    }
}
