//! Component view structs for read model
//!
//! Flattened rows for listings such as the latest components of a stream.

use crate::taxonomy::domain::{Component, SoftwareBuild};
use serde::Serialize;

/// View representation of one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentView {
    pub purl: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub nvr: String,
    /// Owning build as `TYPE:ID`, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
}

impl ComponentView {
    pub fn new(component: &Component, build: Option<&SoftwareBuild>) -> Self {
        Self {
            purl: component.purl.clone(),
            component_type: component.component_type().as_str().to_string(),
            namespace: component.namespace.as_str().to_string(),
            name: component.key.name.clone(),
            version: component.key.version.clone(),
            release: component.key.release.clone(),
            arch: component.key.arch.clone(),
            nvr: component.nvr.clone(),
            build: build.map(|b| b.key.to_string()),
        }
    }
}

/// The components of one stream, as listed by `latest`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentListView {
    pub stream: String,
    /// Whether only root components were considered
    pub roots_only: bool,
    pub components: Vec<ComponentView>,
}
