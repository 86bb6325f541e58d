use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Build systems whose output can be ingested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildType {
    Brew,
    Koji,
    Centos,
    AppInterface,
}

impl BuildType {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildType::Brew => "BREW",
            BuildType::Koji => "KOJI",
            BuildType::Centos => "CENTOS",
            BuildType::AppInterface => "APP_INTERFACE",
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "BREW" => Ok(BuildType::Brew),
            "KOJI" => Ok(BuildType::Koji),
            "CENTOS" => Ok(BuildType::Centos),
            "APP_INTERFACE" => Ok(BuildType::AppInterface),
            _ => Err(format!("Unsupported build type: {}", s)),
        }
    }
}

/// Natural key of a build: the external id plus the system that produced it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BuildKey {
    pub build_id: String,
    pub build_type: BuildType,
}

impl BuildKey {
    pub fn new(build_id: impl Into<String>, build_type: BuildType) -> Self {
        Self {
            build_id: build_id.into(),
            build_type,
        }
    }
}

impl fmt::Display for BuildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.build_type, self.build_id)
    }
}

/// One external build
#[derive(Debug, Clone, PartialEq)]
pub struct SoftwareBuild {
    pub id: i64,
    pub key: BuildKey,
    pub name: String,
    pub source: String,
    pub completion_time: Option<DateTime<Utc>>,
    pub meta_attr: Map<String, Value>,
}

/// Values for creating a build row
#[derive(Debug, Clone, PartialEq)]
pub struct SoftwareBuildDraft {
    pub key: BuildKey,
    pub name: String,
    pub source: String,
    pub completion_time: Option<DateTime<Utc>>,
    pub meta_attr: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_type_parsing() {
        assert_eq!("brew".parse::<BuildType>().unwrap(), BuildType::Brew);
        assert_eq!(
            "app-interface".parse::<BuildType>().unwrap(),
            BuildType::AppInterface
        );
        assert!("PNC".parse::<BuildType>().is_err());
    }

    #[test]
    fn test_build_key_display() {
        let key = BuildKey::new("1911112", BuildType::Brew);
        assert_eq!(key.to_string(), "BREW:1911112");
    }
}
