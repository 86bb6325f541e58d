use super::node::{NodePayload, PayloadKind, PayloadRef};
use super::purl::PackageUrl;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Closed set of component types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ComponentType {
    #[serde(rename = "CARGO")]
    Cargo,
    #[serde(rename = "OCI")]
    ContainerImage,
    #[serde(rename = "GEM")]
    Gem,
    #[serde(rename = "GENERIC")]
    Generic,
    #[serde(rename = "GITHUB")]
    Github,
    #[serde(rename = "GOLANG")]
    Golang,
    #[serde(rename = "MAVEN")]
    Maven,
    #[serde(rename = "NPM")]
    Npm,
    #[serde(rename = "RPMMOD")]
    RpmModule,
    #[serde(rename = "RPM")]
    Rpm,
    #[serde(rename = "PYPI")]
    Pypi,
}

impl ComponentType {
    pub const ALL: [ComponentType; 11] = [
        ComponentType::Cargo,
        ComponentType::ContainerImage,
        ComponentType::Gem,
        ComponentType::Generic,
        ComponentType::Github,
        ComponentType::Golang,
        ComponentType::Maven,
        ComponentType::Npm,
        ComponentType::RpmModule,
        ComponentType::Rpm,
        ComponentType::Pypi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentType::Cargo => "CARGO",
            ComponentType::ContainerImage => "OCI",
            ComponentType::Gem => "GEM",
            ComponentType::Generic => "GENERIC",
            ComponentType::Github => "GITHUB",
            ComponentType::Golang => "GOLANG",
            ComponentType::Maven => "MAVEN",
            ComponentType::Npm => "NPM",
            ComponentType::RpmModule => "RPMMOD",
            ComponentType::Rpm => "RPM",
            ComponentType::Pypi => "PYPI",
        }
    }

    /// The purl type token, which is the lowercased enum value
    pub fn purl_type(self) -> String {
        self.as_str().to_lowercase()
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        ComponentType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| format!("Unknown component type: {}", s))
    }
}

/// Whether a component was built by Red Hat or taken as-is from upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Namespace {
    Upstream,
    Redhat,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Upstream => "UPSTREAM",
            Namespace::Redhat => "REDHAT",
        }
    }
}

impl FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "UPSTREAM" => Ok(Namespace::Upstream),
            "REDHAT" => Ok(Namespace::Redhat),
            _ => Err(format!("Unknown namespace: {}", s)),
        }
    }
}

/// Natural key of a component
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKey {
    pub component_type: ComponentType,
    pub name: String,
    pub version: String,
    pub release: String,
    pub arch: String,
}

impl ComponentKey {
    pub fn new(
        component_type: ComponentType,
        name: impl Into<String>,
        version: impl Into<String>,
        release: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        Self {
            component_type,
            name: name.into(),
            version: version.into(),
            release: release.into(),
            arch: arch.into(),
        }
    }

    pub fn nvr(&self) -> String {
        let release = if self.release.is_empty() {
            String::new()
        } else {
            format!("-{}", self.release)
        };
        format!("{}-{}{}", self.name, self.version, release)
    }

    pub fn nevra(&self, epoch: u32) -> String {
        let epoch = if epoch > 0 {
            format!(":{}", epoch)
        } else {
            String::new()
        };
        let release = if self.release.is_empty() {
            String::new()
        } else {
            format!("-{}", self.release)
        };
        let arch = if self.arch.is_empty() {
            String::new()
        } else {
            format!(".{}", self.arch)
        };
        format!("{}{}-{}{}{}", self.name, epoch, self.version, release, arch)
    }

    pub fn is_srpm(&self) -> bool {
        self.component_type == ComponentType::Rpm && self.arch == "src"
    }

    pub fn is_binary_rpm(&self) -> bool {
        self.component_type == ComponentType::Rpm && self.arch != "src"
    }
}

/// Values supplied by an ingestion record for one component
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDraft {
    pub key: ComponentKey,
    pub namespace: Namespace,
    pub epoch: u32,
    pub description: String,
    pub related_url: String,
    pub license_declared_raw: String,
    pub meta_attr: Map<String, Value>,
    pub software_build: Option<i64>,
}

impl ComponentDraft {
    pub fn new(key: ComponentKey, namespace: Namespace) -> Self {
        Self {
            key,
            namespace,
            epoch: 0,
            description: String::new(),
            related_url: String::new(),
            license_declared_raw: String::new(),
            meta_attr: Map::new(),
            software_build: None,
        }
    }

    pub fn purl(&self) -> String {
        PackageUrl::for_component(&self.key, self.namespace, self.epoch, &self.meta_attr)
            .to_string()
    }

    /// Builds the stored record for a component seen for the first time
    pub fn into_component(self, uuid: Uuid) -> Component {
        let purl = self.purl();
        let nvr = self.key.nvr();
        let nevra = self.key.nevra(self.epoch);
        Component {
            uuid,
            key: self.key,
            namespace: self.namespace,
            epoch: self.epoch,
            description: self.description,
            related_url: self.related_url,
            license_declared_raw: self.license_declared_raw,
            meta_attr: self.meta_attr,
            software_build: self.software_build,
            purl,
            nvr,
            nevra,
        }
    }
}

/// One software artifact
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub uuid: Uuid,
    pub key: ComponentKey,
    pub namespace: Namespace,
    pub epoch: u32,
    pub description: String,
    pub related_url: String,
    pub license_declared_raw: String,
    pub meta_attr: Map<String, Value>,
    pub software_build: Option<i64>,
    pub purl: String,
    pub nvr: String,
    pub nevra: String,
}

impl Component {
    pub fn component_type(&self) -> ComponentType {
        self.key.component_type
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn is_srpm(&self) -> bool {
        self.key.is_srpm()
    }

    /// Merges a re-ingested draft into this record.
    ///
    /// Identity fields (namespace, epoch, purl) are fixed at creation. Empty
    /// incoming strings never replace recorded values. Returns whether
    /// anything changed.
    pub fn merge(&mut self, draft: &ComponentDraft) -> bool {
        let mut changed = false;
        changed |= merge_non_empty(&mut self.description, &draft.description);
        changed |= merge_non_empty(&mut self.related_url, &draft.related_url);
        changed |= merge_non_empty(&mut self.license_declared_raw, &draft.license_declared_raw);
        for (key, value) in &draft.meta_attr {
            if self.meta_attr.get(key) != Some(value) {
                self.meta_attr.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        if draft.software_build.is_some() && self.software_build != draft.software_build {
            self.software_build = draft.software_build;
            changed = true;
        }
        changed
    }
}

fn merge_non_empty(current: &mut String, incoming: &str) -> bool {
    if incoming.is_empty() || current == incoming {
        return false;
    }
    *current = incoming.to_string();
    true
}

impl NodePayload for Component {
    fn payload_ref(&self) -> PayloadRef {
        PayloadRef::new(PayloadKind::Component, self.uuid)
    }

    fn node_identity(&self) -> &str {
        &self.purl
    }
}
