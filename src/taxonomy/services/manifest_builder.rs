use super::LatestRootSelector;
use crate::ports::outbound::{ManifestRecord, RegistryStore};
use crate::shared::error::RegistryError;
use crate::shared::Result;
use crate::taxonomy::domain::Component;
use chrono::Utc;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// What a manifest describes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSubject {
    /// Latest root components of a product stream, by stream name
    Stream(String),
    /// One component, by purl
    Component(String),
}

impl fmt::Display for ManifestSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestSubject::Stream(name) => write!(f, "stream:{}", name),
            ManifestSubject::Component(purl) => write!(f, "component:{}", purl),
        }
    }
}

/// A rendered manifest with the wrapper identity it was saved under
#[derive(Debug, Clone)]
pub struct Manifest {
    pub record: ManifestRecord,
    pub document: Value,
}

impl Manifest {
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }
}

/// ManifestBuilder service for content-addressed package manifests
///
/// The package list and relationships are a function of the stored graph
/// only. The document id and creation time change only when that content
/// hash changes.
pub struct ManifestBuilder<'a, S: RegistryStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RegistryStore + ?Sized> ManifestBuilder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn build(&self, subject: &ManifestSubject) -> Result<Manifest> {
        let roots = self.roots(subject)?;
        let subject_key = subject.to_string();

        let mut packages: BTreeMap<String, Value> = BTreeMap::new();
        let mut relationships: BTreeSet<(String, &'static str, String)> = BTreeSet::new();
        for root in &roots {
            packages.insert(root.purl.clone(), package_entry(root));
            relationships.insert((subject_key.clone(), "DESCRIBES", root.purl.clone()));

            let links = self.store.component_links(root.uuid)?;
            for (relation, members) in [("CONTAINS", &links.provides), ("GENERATED_FROM", &links.upstreams)] {
                for uuid in members {
                    let Some(member) = self.store.get_component(*uuid)? else {
                        tracing::warn!(component = %uuid, "component link points to a missing component");
                        continue;
                    };
                    relationships.insert((root.purl.clone(), relation, member.purl.clone()));
                    packages.entry(member.purl.clone()).or_insert_with(|| package_entry(&member));
                }
            }
        }

        let content = json!({
            "packages": packages.into_values().collect::<Vec<_>>(),
            "relationships": relationships
                .into_iter()
                .map(|(element, kind, related)| json!({"element": element, "type": kind, "related": related}))
                .collect::<Vec<_>>(),
        });
        let content_hash = hex::encode(Sha256::digest(serde_json::to_string(&content)?.as_bytes()));
        let record = self.identity_for(&subject_key, content_hash)?;

        let mut document = content;
        if let Value::Object(map) = &mut document {
            map.insert("subject".to_string(), json!(subject_key));
            map.insert("document_id".to_string(), json!(record.document_id));
            map.insert("created".to_string(), json!(record.created.to_rfc3339()));
            map.insert("content_hash".to_string(), json!(record.content_hash));
        }
        tracing::info!(subject = %subject_key, roots = roots.len(), hash = %record.content_hash, "built manifest");
        Ok(Manifest { record, document })
    }

    fn roots(&self, subject: &ManifestSubject) -> Result<Vec<Component>> {
        match subject {
            ManifestSubject::Stream(name) => LatestRootSelector::new(self.store).latest_roots(name),
            ManifestSubject::Component(purl) => {
                let component = self.store.find_component_by_purl(purl)?.ok_or_else(|| {
                    RegistryError::NotFound {
                        entity: "Component",
                        key: purl.clone(),
                        hint: "Ingest the build that produces this component first".to_string(),
                    }
                })?;
                Ok(vec![component])
            }
        }
    }

    /// Reuses the stored wrapper identity when the content is unchanged
    fn identity_for(&self, subject: &str, content_hash: String) -> Result<ManifestRecord> {
        if let Some(existing) = self.store.find_manifest(subject)? {
            if existing.content_hash == content_hash {
                return Ok(existing);
            }
            tracing::debug!(subject = %subject, previous = %existing.content_hash, "manifest content changed");
        }
        let record = ManifestRecord {
            subject: subject.to_string(),
            document_id: format!("urn:uuid:{}", Uuid::new_v4()),
            created: Utc::now(),
            content_hash,
        };
        self.store.save_manifest(&record)?;
        Ok(record)
    }
}

fn package_entry(component: &Component) -> Value {
    json!({
        "purl": component.purl,
        "type": component.component_type().as_str(),
        "namespace": component.namespace.as_str(),
        "name": component.key.name,
        "version": component.key.version,
        "release": component.key.release,
        "arch": component.key.arch,
        "nevra": component.nevra,
        "license_declared": component.license_declared_raw,
        "related_url": component.related_url,
    })
}
