use crate::shared::Result;
use crate::taxonomy::domain::{BuildKey, BuildRecord};
use async_trait::async_trait;

/// BuildMetadataSource port for collector output
///
/// Collectors talk to the build systems; this port only hands over their
/// normalized record tree for one build.
///
/// # Errors
/// Implementations return `RegistryError::SourceUnavailable` for conditions
/// that may clear up on retry, and `RegistryError::NotFound` when the build
/// is unknown to the collector.
#[async_trait]
pub trait BuildMetadataSource: Send + Sync {
    async fn fetch_build(&self, key: &BuildKey) -> Result<BuildRecord>;
}
