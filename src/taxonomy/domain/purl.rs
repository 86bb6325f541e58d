use super::component::{ComponentKey, ComponentType, Namespace};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Digest formats tried in order when building a container purl
const CONTAINER_DIGEST_FORMATS: [&str; 2] = [
    "application/vnd.docker.distribution.manifest.list.v2+json",
    "application/vnd.docker.distribution.manifest.v2+json",
];

/// Minimal package URL used as the canonical component identity.
///
/// Qualifiers are kept sorted so the rendered string is stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUrl {
    purl_type: String,
    namespace: Vec<String>,
    name: String,
    version: String,
    qualifiers: BTreeMap<String, String>,
}

impl PackageUrl {
    pub fn for_component(
        key: &ComponentKey,
        namespace: Namespace,
        epoch: u32,
        meta_attr: &Map<String, Value>,
    ) -> Self {
        let mut purl = match key.component_type {
            ComponentType::Rpm => Self::rpm(key, epoch),
            ComponentType::RpmModule => Self::module(key),
            ComponentType::ContainerImage => Self::container(key, meta_attr),
            ComponentType::Maven => Self::maven(key, meta_attr),
            other => Self::generic(other, key),
        };
        if namespace == Namespace::Redhat {
            purl.namespace.insert(0, "redhat".to_string());
        }
        purl
    }

    fn base(component_type: ComponentType, name: &str, version: String) -> Self {
        Self {
            purl_type: component_type.purl_type(),
            namespace: Vec::new(),
            name: name.to_string(),
            version,
            qualifiers: BTreeMap::new(),
        }
    }

    fn rpm(key: &ComponentKey, epoch: u32) -> Self {
        let mut purl = Self::base(ComponentType::Rpm, &key.name, version_release(key));
        purl.qualifiers.insert("arch".to_string(), key.arch.clone());
        if epoch > 0 {
            purl.qualifiers.insert("epoch".to_string(), epoch.to_string());
        }
        purl
    }

    /// Modules encode name:stream:version:context; the release holds `version.context`
    fn module(key: &ComponentKey) -> Self {
        let (version, context) = key
            .release
            .split_once('.')
            .unwrap_or((key.release.as_str(), ""));
        Self::base(
            ComponentType::RpmModule,
            &key.name,
            format!("{}:{}:{}", key.version, version, context),
        )
    }

    fn container(key: &ComponentKey, meta_attr: &Map<String, Value>) -> Self {
        let digest = meta_attr
            .get("digests")
            .and_then(Value::as_object)
            .and_then(|digests| {
                CONTAINER_DIGEST_FORMATS
                    .iter()
                    .find_map(|format| digests.get(*format).and_then(Value::as_str))
            })
            .unwrap_or_default()
            .to_string();
        let name = meta_attr
            .get("name_from_label")
            .and_then(Value::as_str)
            .filter(|label| !label.is_empty())
            .unwrap_or(&key.name);

        let mut purl = Self::base(ComponentType::ContainerImage, name, digest);
        purl.qualifiers
            .insert("tag".to_string(), version_release(key));
        if key.arch != "noarch" && !key.arch.is_empty() {
            purl.qualifiers.insert("arch".to_string(), key.arch.clone());
        }
        if let Some(url) = meta_attr.get("repository_url").and_then(Value::as_str) {
            purl.qualifiers
                .insert("repository_url".to_string(), url.to_string());
        }
        purl
    }

    fn maven(key: &ComponentKey, meta_attr: &Map<String, Value>) -> Self {
        let mut purl = Self::base(ComponentType::Maven, &key.name, key.version.clone());
        if let Some(group_id) = meta_attr.get("group_id").and_then(Value::as_str) {
            purl.namespace
                .extend(group_id.split('/').map(str::to_string));
        }
        if let Some(classifier) = meta_attr.get("classifier").and_then(Value::as_str) {
            purl.qualifiers
                .insert("classifier".to_string(), classifier.to_string());
        }
        if let Some(extension) = meta_attr.get("type").and_then(Value::as_str) {
            purl.qualifiers
                .insert("type".to_string(), extension.to_string());
        }
        purl
    }

    fn generic(component_type: ComponentType, key: &ComponentKey) -> Self {
        Self::base(component_type, &key.name, version_release(key))
    }
}

fn version_release(key: &ComponentKey) -> String {
    if key.release.is_empty() {
        key.version.clone()
    } else {
        format!("{}-{}", key.version, key.release)
    }
}

impl fmt::Display for PackageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkg:{}/", self.purl_type)?;
        for segment in self.namespace.iter().filter(|s| !s.is_empty()) {
            write!(f, "{}/", urlencoding::encode(segment))?;
        }
        write!(f, "{}", urlencoding::encode(&self.name))?;
        if !self.version.is_empty() {
            let encoded: Vec<String> = self
                .version
                .split(':')
                .map(|part| urlencoding::encode(part).into_owned())
                .collect();
            write!(f, "@{}", encoded.join(":"))?;
        }
        let qualifiers: Vec<String> = self
            .qualifiers
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect();
        if !qualifiers.is_empty() {
            write!(f, "?{}", qualifiers.join("&"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn purl(key: ComponentKey, namespace: Namespace, meta: Value) -> String {
        let meta = meta.as_object().cloned().unwrap_or_default();
        PackageUrl::for_component(&key, namespace, 0, &meta).to_string()
    }

    #[test]
    fn test_rpm_purl() {
        let key = ComponentKey::new(ComponentType::Rpm, "foo", "1.0", "1", "src");
        assert_eq!(
            purl(key.clone(), Namespace::Redhat, json!({})),
            "pkg:rpm/redhat/foo@1.0-1?arch=src"
        );
        let with_epoch = PackageUrl::for_component(&key, Namespace::Redhat, 1, &Map::new());
        assert_eq!(
            with_epoch.to_string(),
            "pkg:rpm/redhat/foo@1.0-1?arch=src&epoch=1"
        );
    }

    #[test]
    fn test_module_purl() {
        let key = ComponentKey::new(
            ComponentType::RpmModule,
            "nodejs",
            "18",
            "8070020230306170042.ad008a3a",
            "noarch",
        );
        assert_eq!(
            purl(key, Namespace::Redhat, json!({})),
            "pkg:rpmmod/redhat/nodejs@18:8070020230306170042:ad008a3a"
        );
    }

    #[test]
    fn test_container_purl_uses_digest_and_tag() {
        let key = ComponentKey::new(ComponentType::ContainerImage, "ubi8", "8.6", "754", "x86_64");
        let meta = json!({
            "digests": {
                "application/vnd.docker.distribution.manifest.v2+json": "sha256:abc"
            },
            "repository_url": "registry.redhat.io/ubi8"
        });
        assert_eq!(
            purl(key, Namespace::Redhat, meta),
            "pkg:oci/redhat/ubi8@sha256:abc?arch=x86_64&repository_url=registry.redhat.io%2Fubi8&tag=8.6-754"
        );
    }

    #[test]
    fn test_noarch_container_omits_arch() {
        let key = ComponentKey::new(ComponentType::ContainerImage, "ubi8", "8.6", "754", "noarch");
        assert_eq!(
            purl(key, Namespace::Redhat, json!({})),
            "pkg:oci/redhat/ubi8?tag=8.6-754"
        );
    }

    #[test]
    fn test_maven_purl_keeps_group_namespace() {
        let key = ComponentKey::new(ComponentType::Maven, "log4j-core", "2.17.1.redhat-00001", "", "noarch");
        let meta = json!({"group_id": "org.apache.logging.log4j", "type": "jar"});
        assert_eq!(
            purl(key, Namespace::Redhat, meta),
            "pkg:maven/redhat/org.apache.logging.log4j/log4j-core@2.17.1.redhat-00001?type=jar"
        );
    }

    #[test]
    fn test_upstream_golang_purl() {
        let key = ComponentKey::new(ComponentType::Golang, "github.com/openshift/api", "v0.0.1", "", "noarch");
        assert_eq!(
            purl(key, Namespace::Upstream, json!({})),
            "pkg:golang/github.com%2Fopenshift%2Fapi@v0.0.1"
        );
    }
}
