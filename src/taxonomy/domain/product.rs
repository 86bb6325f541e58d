use super::node::{NodePayload, PayloadKind, PayloadRef};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Trailing version-like suffix of a product entity name, e.g. `8.6.0` in `rhel-8.6.0`
static VERSION_LIKE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\dz.-]*$").expect("static regex"));

/// Position in the fixed product hierarchy; channels hang below variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductLevel {
    Product,
    ProductVersion,
    ProductStream,
    ProductVariant,
    Channel,
}

impl ProductLevel {
    pub const MODEL_LEVELS: [ProductLevel; 4] = [
        ProductLevel::Product,
        ProductLevel::ProductVersion,
        ProductLevel::ProductStream,
        ProductLevel::ProductVariant,
    ];

    pub const ALL: [ProductLevel; 5] = [
        ProductLevel::Product,
        ProductLevel::ProductVersion,
        ProductLevel::ProductStream,
        ProductLevel::ProductVariant,
        ProductLevel::Channel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProductLevel::Product => "PRODUCT",
            ProductLevel::ProductVersion => "PRODUCT_VERSION",
            ProductLevel::ProductStream => "PRODUCT_STREAM",
            ProductLevel::ProductVariant => "PRODUCT_VARIANT",
            ProductLevel::Channel => "CHANNEL",
        }
    }

    pub fn depth(self) -> u32 {
        match self {
            ProductLevel::Product => 0,
            ProductLevel::ProductVersion => 1,
            ProductLevel::ProductStream => 2,
            ProductLevel::ProductVariant => 3,
            ProductLevel::Channel => 4,
        }
    }

    /// The level directly above this one, if any
    pub fn parent_level(self) -> Option<ProductLevel> {
        match self {
            ProductLevel::Product => None,
            ProductLevel::ProductVersion => Some(ProductLevel::Product),
            ProductLevel::ProductStream => Some(ProductLevel::ProductVersion),
            ProductLevel::ProductVariant => Some(ProductLevel::ProductStream),
            ProductLevel::Channel => Some(ProductLevel::ProductVariant),
        }
    }
}

impl fmt::Display for ProductLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "PRODUCT" => Ok(ProductLevel::Product),
            "PRODUCT_VERSION" | "VERSION" => Ok(ProductLevel::ProductVersion),
            "PRODUCT_STREAM" | "STREAM" => Ok(ProductLevel::ProductStream),
            "PRODUCT_VARIANT" | "VARIANT" => Ok(ProductLevel::ProductVariant),
            "CHANNEL" => Ok(ProductLevel::Channel),
            _ => Err(format!(
                "Invalid product level: {}. Expected product, version, stream, variant or channel",
                s
            )),
        }
    }
}

/// Foreign keys of a product model up the hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    pub product: Option<Uuid>,
    pub product_version: Option<Uuid>,
    pub product_stream: Option<Uuid>,
}

/// Extra attributes carried only by streams
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDetails {
    pub active: bool,
    /// Brew tag name to "inherit" flag
    pub brew_tags: BTreeMap<String, bool>,
    pub yum_repositories: Vec<String>,
    pub composes: Vec<String>,
}

/// Product, ProductVersion, ProductStream or ProductVariant
#[derive(Debug, Clone, PartialEq)]
pub struct ProductModel {
    pub uuid: Uuid,
    pub level: ProductLevel,
    pub name: String,
    pub description: String,
    pub version: String,
    pub ofuri: String,
    pub cpe: String,
    pub lineage: Lineage,
    pub stream: Option<StreamDetails>,
    pub meta_attr: Map<String, Value>,
}

impl NodePayload for ProductModel {
    fn payload_ref(&self) -> PayloadRef {
        PayloadRef::new(PayloadKind::from(self.level), self.uuid)
    }

    fn node_identity(&self) -> &str {
        &self.name
    }
}

/// Values for creating or updating a product model
#[derive(Debug, Clone, PartialEq)]
pub struct ProductModelDraft {
    pub level: ProductLevel,
    pub name: String,
    pub description: String,
    pub version: String,
    pub ofuri: String,
    pub cpe: String,
    pub lineage: Lineage,
    pub stream: Option<StreamDetails>,
    pub meta_attr: Map<String, Value>,
}

impl ProductModelDraft {
    pub fn new(level: ProductLevel, name: impl Into<String>) -> Self {
        Self {
            level,
            name: name.into(),
            description: String::new(),
            version: String::new(),
            ofuri: String::new(),
            cpe: String::new(),
            lineage: Lineage::default(),
            stream: None,
            meta_attr: Map::new(),
        }
    }
}

/// Delivery surface type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelType {
    CdnRepo,
    ContainerRegistry,
}

impl ChannelType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelType::CdnRepo => "CDN_REPO",
            ChannelType::ContainerRegistry => "CONTAINER_REGISTRY",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "CDN_REPO" => Some(ChannelType::CdnRepo),
            "CONTAINER_REGISTRY" => Some(ChannelType::ContainerRegistry),
            _ => None,
        }
    }
}

/// A repository or registry that ships content for one or more variants
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub uuid: Uuid,
    pub name: String,
    pub channel_type: ChannelType,
    pub relative_url: String,
    pub description: String,
    pub meta_attr: Map<String, Value>,
}

/// Values for creating or updating a channel; the name is the natural key
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDraft {
    pub name: String,
    pub channel_type: ChannelType,
    pub relative_url: String,
    pub description: String,
    pub meta_attr: Map<String, Value>,
}

impl NodePayload for Channel {
    fn payload_ref(&self) -> PayloadRef {
        PayloadRef::new(PayloadKind::Channel, self.uuid)
    }

    fn node_identity(&self) -> &str {
        &self.name
    }
}

/// Ofuri construction for product models.
///
/// Products are `o:redhat:{name}`; versions and streams append the
/// version-like part of their own name; variants append their lowercased
/// name to the stream ofuri.
pub struct Ofuri;

impl Ofuri {
    pub fn product(name: &str) -> String {
        format!("o:redhat:{}", name)
    }

    pub fn version(product_name: &str, version_name: &str, version: &str) -> String {
        let version = Self::version_part(version_name, version);
        if version.is_empty() {
            return format!("o:redhat:{}", version_name);
        }
        format!("o:redhat:{}:{}", product_name, version)
    }

    pub fn stream(product_name: &str, stream_name: &str, version: &str) -> String {
        Self::version(product_name, stream_name, version)
    }

    pub fn variant(stream_ofuri: Option<&str>, variant_name: &str) -> String {
        match stream_ofuri {
            Some(ofuri) => format!("{}:{}", ofuri, variant_name.to_lowercase()),
            None => format!("o:redhat:{}", variant_name),
        }
    }

    /// The explicit version if given, otherwise the version-like suffix of the name
    pub fn version_part(name: &str, version: &str) -> String {
        if !version.is_empty() {
            return version.to_string();
        }
        VERSION_LIKE_SUFFIX
            .find(name)
            .map(|m| m.as_str().trim_end_matches(['.', '-']).to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_ofuri() {
        assert_eq!(Ofuri::product("rhel"), "o:redhat:rhel");
    }

    #[test]
    fn test_stream_ofuri_from_name_suffix() {
        assert_eq!(
            Ofuri::stream("rhel", "rhel-8.6.0", ""),
            "o:redhat:rhel:8.6.0"
        );
        assert_eq!(
            Ofuri::stream("rhel", "rhel-8.6.0.z", ""),
            "o:redhat:rhel:8.6.0.z"
        );
    }

    #[test]
    fn test_explicit_version_wins() {
        assert_eq!(Ofuri::version("openshift", "openshift-4", "4.12"), "o:redhat:openshift:4.12");
    }

    #[test]
    fn test_version_without_version_like_suffix() {
        assert_eq!(Ofuri::version("ansible", "ansible-main", ""), "o:redhat:ansible-main");
    }

    #[test]
    fn test_variant_ofuri() {
        assert_eq!(
            Ofuri::variant(Some("o:redhat:rhel:8.6.0"), "AppStream-8.6.0.Z.MAIN"),
            "o:redhat:rhel:8.6.0:appstream-8.6.0.z.main"
        );
        assert_eq!(Ofuri::variant(None, "BaseOS"), "o:redhat:BaseOS");
    }

    #[test]
    fn test_level_parsing_accepts_short_names() {
        assert_eq!("stream".parse::<ProductLevel>().unwrap(), ProductLevel::ProductStream);
        assert_eq!(
            "product_variant".parse::<ProductLevel>().unwrap(),
            ProductLevel::ProductVariant
        );
        assert!("module".parse::<ProductLevel>().is_err());
    }

    #[test]
    fn test_parent_levels() {
        assert_eq!(ProductLevel::Product.parent_level(), None);
        assert_eq!(
            ProductLevel::Channel.parent_level(),
            Some(ProductLevel::ProductVariant)
        );
        assert_eq!(ProductLevel::ProductVariant.depth(), 3);
    }
}
