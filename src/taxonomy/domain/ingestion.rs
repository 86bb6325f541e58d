//! Record shapes handed over by the external build-metadata collectors.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Collector output for one build: the owning build plus its artifact tree
#[derive(Debug, Clone, Deserialize)]
pub struct BuildRecord {
    pub build_meta: BuildMeta,
    pub tree: ComponentRecord,
}

/// Flat metadata for the owning SoftwareBuild.
///
/// `build_type` stays a raw string so unsupported build systems can be
/// reported as a no-op instead of failing to deserialize.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildMeta {
    pub build_id: String,
    pub build_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub meta_attr: Map<String, Value>,
}

/// One artifact in a collector tree
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentRecord {
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub meta: RecordMeta,
    /// Children provided by this artifact
    #[serde(default)]
    pub components: Vec<ComponentRecord>,
    /// Upstream sources attached directly to a root
    #[serde(default)]
    pub sources: Vec<ComponentRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub epoch: Option<u32>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Development-only dependency; becomes a PROVIDES_DEV edge
    #[serde(default)]
    pub dev: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComponentRecord {
    /// Short label for log lines, e.g. `RPM foo-1.0`
    pub fn label(&self) -> String {
        format!(
            "{} {}-{}",
            self.component_type,
            self.meta.name.as_deref().unwrap_or("<unnamed>"),
            self.meta.version.as_deref().unwrap_or("")
        )
    }
}
