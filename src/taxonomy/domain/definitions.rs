//! Product-definition records handed over by the product-definition source.

use super::product::ChannelType;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductDefinitions {
    #[serde(default)]
    pub products: Vec<ProductRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub versions: Vec<VersionRecord>,
    #[serde(default)]
    pub meta_attr: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionRecord {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub streams: Vec<StreamRecord>,
    #[serde(default)]
    pub meta_attr: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamRecord {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cpe: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub brew_tags: BTreeMap<String, bool>,
    #[serde(default)]
    pub yum_repositories: Vec<String>,
    #[serde(default)]
    pub composes: Vec<String>,
    #[serde(default)]
    pub variants: Vec<VariantRecord>,
    #[serde(default)]
    pub meta_attr: Map<String, Value>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariantRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cpe: String,
    #[serde(default)]
    pub channels: Vec<ChannelRecord>,
    #[serde(default)]
    pub meta_attr: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelRecord {
    pub name: String,
    #[serde(rename = "type", default = "default_channel_type")]
    pub channel_type: ChannelType,
    #[serde(default)]
    pub relative_url: String,
    #[serde(default)]
    pub description: String,
}

fn default_channel_type() -> ChannelType {
    ChannelType::CdnRepo
}

/// Builds found under each brew tag, used to derive BREW_TAG evidence
pub type TagBuilds = BTreeMap<String, Vec<String>>;
