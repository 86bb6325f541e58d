use crate::ports::outbound::{BuildMetadataSource, DefinitionReader};
use crate::shared::error::RegistryError;
use crate::shared::security::read_checked_file;
use crate::shared::Result;
use crate::taxonomy::domain::{BuildKey, BuildRecord, NewRelation, ProductDefinitions, TagBuilds};
use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// FileSystemReader adapter for collector output and definition files
///
/// Implements both the BuildMetadataSource port (collector output laid out as
/// `<collector_dir>/<build_type>/<build_id>.json`) and the DefinitionReader
/// port (product definitions, evidence and tag listings in YAML or JSON).
pub struct FileSystemReader {
    collector_dir: PathBuf,
}

impl FileSystemReader {
    pub fn new() -> Self {
        Self {
            collector_dir: PathBuf::from("."),
        }
    }

    pub fn with_collector_dir(collector_dir: impl Into<PathBuf>) -> Self {
        Self {
            collector_dir: collector_dir.into(),
        }
    }

    pub fn collector_dir(&self) -> &Path {
        &self.collector_dir
    }

    /// Location of one build's collector output
    pub fn build_path(&self, key: &BuildKey) -> Result<PathBuf> {
        let id = key.build_id.as_str();
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(RegistryError::InvalidInput {
                message: format!("build id '{}' is not a plain identifier", id),
            }
            .into());
        }
        Ok(self
            .collector_dir
            .join(key.build_type.as_str().to_lowercase())
            .join(format!("{}.json", id)))
    }

    /// Parses YAML, which also accepts JSON documents
    fn parse_document<T: DeserializeOwned>(path: &Path, description: &str) -> Result<T> {
        let content = read_checked_file(path, description)?;
        serde_yaml_ng::from_str(&content).map_err(|e| {
            RegistryError::InvalidInput {
                message: format!("{} {} could not be parsed: {}", description, path.display(), e),
            }
            .into()
        })
    }
}

impl Default for FileSystemReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildMetadataSource for FileSystemReader {
    async fn fetch_build(&self, key: &BuildKey) -> Result<BuildRecord> {
        let path = self.build_path(key)?;
        let read_path = path.clone();
        let content = tokio::task::spawn_blocking(move || {
            read_checked_file(&read_path, "collector output")
        })
        .await
        .context("collector read task panicked")??;

        let record: BuildRecord = serde_json::from_str(&content).map_err(|e| {
            RegistryError::InvalidInput {
                message: format!("collector output {} is malformed: {}", path.display(), e),
            }
        })?;

        if record.build_meta.build_id != key.build_id {
            return Err(RegistryError::InvalidInput {
                message: format!(
                    "collector output {} describes build {} instead of {}",
                    path.display(),
                    record.build_meta.build_id,
                    key.build_id
                ),
            }
            .into());
        }
        Ok(record)
    }
}

impl DefinitionReader for FileSystemReader {
    fn read_products(&self, path: &Path) -> Result<ProductDefinitions> {
        Self::parse_document(path, "product definitions")
    }

    fn read_relations(&self, path: &Path) -> Result<Vec<NewRelation>> {
        Self::parse_document(path, "relation evidence")
    }

    fn read_tag_builds(&self, path: &Path) -> Result<TagBuilds> {
        // Build ids come as numbers from some exports and strings from others
        let raw: BTreeMap<String, Vec<Value>> = Self::parse_document(path, "tag listing")?;
        raw.into_iter()
            .map(|(tag, ids)| {
                let ids = ids
                    .into_iter()
                    .map(|id| match id {
                        Value::String(s) => Ok(s),
                        Value::Number(n) => Ok(n.to_string()),
                        other => Err(RegistryError::InvalidInput {
                            message: format!("tag {} lists a non-scalar build id: {}", tag, other),
                        }),
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok((tag, ids))
            })
            .collect()
    }
}
