use super::product::ProductLevel;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// External system that produced a piece of build-to-product evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Errata,
    Compose,
    BrewTag,
    CdnRepo,
    YumRepo,
    AppInterface,
}

impl RelationType {
    /// Relation types whose product_ref names a ProductVariant
    pub const VARIANT_TYPES: [RelationType; 2] = [RelationType::CdnRepo, RelationType::Errata];

    /// Relation types whose product_ref names a ProductStream
    pub const STREAM_TYPES: [RelationType; 4] = [
        RelationType::BrewTag,
        RelationType::Compose,
        RelationType::YumRepo,
        RelationType::AppInterface,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationType::Errata => "ERRATA",
            RelationType::Compose => "COMPOSE",
            RelationType::BrewTag => "BREW_TAG",
            RelationType::CdnRepo => "CDN_REPO",
            RelationType::YumRepo => "YUM_REPO",
            RelationType::AppInterface => "APP_INTERFACE",
        }
    }

    /// Level of the product entity named by `product_ref`
    pub fn refers_to(self) -> ProductLevel {
        if Self::VARIANT_TYPES.contains(&self) {
            ProductLevel::ProductVariant
        } else {
            ProductLevel::ProductStream
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "ERRATA" => Ok(RelationType::Errata),
            "COMPOSE" => Ok(RelationType::Compose),
            "BREW_TAG" => Ok(RelationType::BrewTag),
            "CDN_REPO" => Ok(RelationType::CdnRepo),
            "YUM_REPO" => Ok(RelationType::YumRepo),
            "APP_INTERFACE" => Ok(RelationType::AppInterface),
            _ => Err(format!("Unknown relation type: {}", s)),
        }
    }
}

/// Ground-truth evidence that a build ships in a product entity
#[derive(Debug, Clone, PartialEq)]
pub struct ProductComponentRelation {
    pub uuid: Uuid,
    pub relation_type: RelationType,
    pub external_system_id: String,
    pub product_ref: String,
    pub build_id: String,
    pub build_type: String,
    pub software_build: Option<i64>,
    pub meta_attr: Map<String, Value>,
}

/// Values for inserting one bridge row; conflicts on the natural key are no-ops
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewRelation {
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    pub external_system_id: String,
    pub product_ref: String,
    pub build_id: String,
    #[serde(default = "default_build_type")]
    pub build_type: String,
    #[serde(default)]
    pub meta_attr: Map<String, Value>,
}

fn default_build_type() -> String {
    "BREW".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_levels() {
        assert_eq!(RelationType::Errata.refers_to(), ProductLevel::ProductVariant);
        assert_eq!(RelationType::CdnRepo.refers_to(), ProductLevel::ProductVariant);
        assert_eq!(RelationType::BrewTag.refers_to(), ProductLevel::ProductStream);
        assert_eq!(RelationType::AppInterface.refers_to(), ProductLevel::ProductStream);
    }

    #[test]
    fn test_new_relation_defaults_to_brew() {
        let relation: NewRelation = serde_json::from_str(
            r#"{"type": "ERRATA", "external_system_id": "RHBA-2023:0001", "product_ref": "AppStream-8.6.0.Z.MAIN", "build_id": "1911112"}"#,
        )
        .unwrap();
        assert_eq!(relation.relation_type, RelationType::Errata);
        assert_eq!(relation.build_type, "BREW");
        assert!(relation.meta_attr.is_empty());
    }
}
