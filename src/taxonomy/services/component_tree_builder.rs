use super::component_taxonomy::ComponentTaxonomy;
use crate::ports::outbound::RegistryStore;
use crate::shared::error::{is_subtree_error, RegistryError};
use crate::shared::Result;
use crate::taxonomy::domain::{
    BuildKey, BuildRecord, BuildType, Component, ComponentDraft, ComponentKey, ComponentRecord,
    ComponentType, EdgeType, Namespace, Node, NodeId, NodeKind, SoftwareBuild, SoftwareBuildDraft,
};
use crate::taxonomy::policies::{NamespacePolicy, TreePosition, TypeMapping};
use serde_json::Value;

/// Deepest position a collector tree may reach before the subtree is rejected.
/// Guards against self-referencing or runaway collector output.
pub const MAX_TREE_DEPTH: u32 = 64;

/// What happened to one build record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    Ingested,
    /// The build exists and `force` was not set
    AlreadyIngested,
    /// The build system is not one the registry understands
    UnsupportedBuildType,
}

/// A subtree left out of the stored tree, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSubtree {
    pub label: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub build_label: String,
    pub status: IngestStatus,
    pub build: Option<SoftwareBuild>,
    pub created_nodes: Vec<NodeId>,
    pub components_created: usize,
    pub skipped: Vec<SkippedSubtree>,
    pub links_saved: usize,
    pub relations_linked: usize,
}

impl IngestReport {
    fn new(build_label: String, status: IngestStatus) -> Self {
        Self {
            build_label,
            status,
            build: None,
            created_nodes: Vec::new(),
            components_created: 0,
            skipped: Vec::new(),
            links_saved: 0,
            relations_linked: 0,
        }
    }

    pub fn build_key(&self) -> Option<&BuildKey> {
        self.build.as_ref().map(|build| &build.key)
    }
}

/// ComponentTreeBuilder service turning collector records into component trees
///
/// Nodes are created top-down through `create_or_get`, so re-running a build
/// (or racing another worker on it) converges on the same tree.
pub struct ComponentTreeBuilder<'a, S: RegistryStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RegistryStore + ?Sized> ComponentTreeBuilder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Ingests one build record.
    ///
    /// Unsupported build types and already-ingested builds (without `force`)
    /// are reported, not raised. Data-shape and integrity problems skip the
    /// offending subtree only.
    pub fn ingest(&self, record: &BuildRecord, force: bool) -> Result<IngestReport> {
        let meta = &record.build_meta;
        let Ok(build_type) = meta.build_type.parse::<BuildType>() else {
            tracing::info!(build_id = %meta.build_id, build_type = %meta.build_type, "unsupported build type; nothing to ingest");
            return Ok(IngestReport::new(
                format!("{}:{}", meta.build_type, meta.build_id),
                IngestStatus::UnsupportedBuildType,
            ));
        };
        let key = BuildKey::new(meta.build_id.clone(), build_type);

        if !force {
            if let Some(existing) = self.store.find_build(&key)? {
                tracing::debug!(build = %key, "build already ingested");
                let mut report = IngestReport::new(key.to_string(), IngestStatus::AlreadyIngested);
                report.build = Some(existing);
                return Ok(report);
            }
        }

        let (build, _) = self.store.save_build(&SoftwareBuildDraft {
            key: key.clone(),
            name: meta.name.clone(),
            source: meta.source.clone(),
            completion_time: meta.completion_time,
            meta_attr: meta.meta_attr.clone(),
        })?;
        let mut report = IngestReport::new(key.to_string(), IngestStatus::Ingested);

        match self.save_root(&record.tree, &build, &mut report) {
            Ok(root) => {
                report.links_saved = ComponentTaxonomy::new(self.store).save_for_tree(&root)?;
            }
            Err(err) if is_subtree_error(&err) => {
                tracing::warn!(build = %key, component = %record.tree.label(), error = %err, "root record rejected");
                report.skipped.push(SkippedSubtree {
                    label: record.tree.label(),
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }

        report.relations_linked = self.store.link_relations_to_build(&build)?;
        tracing::info!(
            build = %key,
            nodes_created = report.created_nodes.len(),
            components_created = report.components_created,
            skipped = report.skipped.len(),
            "ingested build"
        );
        report.build = Some(build);
        Ok(report)
    }

    fn save_root(
        &self,
        record: &ComponentRecord,
        build: &SoftwareBuild,
        report: &mut IngestReport,
    ) -> Result<Node> {
        let mut draft = component_draft(record, TreePosition::Root)?;
        draft.software_build = Some(build.id);
        let component = self.upsert(&draft, report)?;
        let root = self.place(EdgeType::Source, None, &component, report)?;

        if let Some(url) = record.meta.url.as_deref().filter(|url| !url.is_empty()) {
            let upstream = upstream_of(&component, url);
            let label = format!("upstream of {}", component.nvr);
            self.guard(&label, report, |builder, report| {
                let upstream = builder.upsert(&upstream, report)?;
                builder.place(EdgeType::Source, Some(&root), &upstream, report)?;
                Ok(())
            })?;
        }

        for source in &record.sources {
            self.save_subtree(source, EdgeType::Source, &root, &component, TreePosition::Upstream, build, report)?;
        }
        for child in &record.components {
            self.save_subtree(child, child_edge(child), &root, &component, TreePosition::Child, build, report)?;
        }
        Ok(root)
    }

    #[allow(clippy::too_many_arguments)]
    fn save_subtree(
        &self,
        record: &ComponentRecord,
        edge: EdgeType,
        parent: &Node,
        parent_component: &Component,
        position: TreePosition,
        build: &SoftwareBuild,
        report: &mut IngestReport,
    ) -> Result<()> {
        self.guard(&record.label(), report, |builder, report| {
            if parent.depth() >= MAX_TREE_DEPTH {
                return Err(RegistryError::InvalidInput {
                    message: format!("tree deeper than {} levels", MAX_TREE_DEPTH),
                }
                .into());
            }

            let mut draft = component_draft(record, position)?;
            // Only a binary built from this build's SRPM belongs to the build
            if draft.key.is_binary_rpm() && parent_component.is_srpm() {
                draft.software_build = Some(build.id);
            }
            let component = builder.upsert(&draft, report)?;
            let node = builder.place(edge, Some(parent), &component, report)?;

            for child in &record.components {
                builder.save_subtree(child, child_edge(child), &node, &component, TreePosition::Child, build, report)?;
            }
            Ok(())
        })
    }

    /// Runs one subtree step, turning subtree-scoped errors into a skip entry
    fn guard<F>(&self, label: &str, report: &mut IngestReport, step: F) -> Result<()>
    where
        F: FnOnce(&Self, &mut IngestReport) -> Result<()>,
    {
        match step(self, report) {
            Ok(()) => Ok(()),
            Err(err) if is_subtree_error(&err) => {
                tracing::warn!(build = %report.build_label, component = %label, error = %err, "skipping subtree");
                report.skipped.push(SkippedSubtree {
                    label: label.to_string(),
                    reason: err.to_string(),
                });
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn upsert(&self, draft: &ComponentDraft, report: &mut IngestReport) -> Result<Component> {
        let (component, created) = self.store.upsert_component(draft)?;
        if created {
            report.components_created += 1;
        }
        Ok(component)
    }

    fn place(
        &self,
        edge: EdgeType,
        parent: Option<&Node>,
        component: &Component,
        report: &mut IngestReport,
    ) -> Result<Node> {
        let (node, created) =
            self.store
                .create_or_get(NodeKind::Component(edge), parent, &component.purl, component)?;
        if created {
            report.created_nodes.push(node.id());
        }
        Ok(node)
    }
}

fn child_edge(record: &ComponentRecord) -> EdgeType {
    if record.meta.dev {
        EdgeType::ProvidesDev
    } else {
        EdgeType::Provides
    }
}

/// Normalizes one collector record into a component draft
pub fn component_draft(record: &ComponentRecord, position: TreePosition) -> Result<ComponentDraft> {
    let mapped = TypeMapping::resolve(&record.component_type)?;
    let meta = &record.meta;

    let name = non_empty(meta.name.as_deref()).ok_or_else(|| RegistryError::MissingField {
        field: "name",
        context: record.label(),
    })?;
    let version = non_empty(meta.version.as_deref());
    let version_optional =
        mapped.component_type == ComponentType::Generic || position == TreePosition::Upstream;
    if version.is_none() && !version_optional {
        return Err(RegistryError::MissingField {
            field: "version",
            context: record.label(),
        }
        .into());
    }
    let version = version.unwrap_or_default();

    let namespace = NamespacePolicy::decide(
        record.namespace.as_deref(),
        position,
        mapped.component_type,
        version,
    );
    let key = ComponentKey::new(
        mapped.component_type,
        name,
        version,
        meta.release.as_deref().unwrap_or_default(),
        non_empty(meta.arch.as_deref()).unwrap_or("noarch"),
    );

    let mut draft = ComponentDraft::new(key, namespace);
    draft.epoch = meta.epoch.unwrap_or(0);
    draft.description = meta.description.clone().unwrap_or_default();
    draft.related_url = meta.url.clone().unwrap_or_default();
    draft.license_declared_raw = meta.license.clone().unwrap_or_default();
    draft.meta_attr = meta.extra.clone();
    if let Some(go_type) = mapped.go_component_type {
        draft
            .meta_attr
            .insert("go_component_type".to_string(), Value::String(go_type));
    }
    Ok(draft)
}

/// The upstream origin of a root that names its project URL
fn upstream_of(root: &Component, url: &str) -> ComponentDraft {
    let key = ComponentKey::new(root.component_type(), root.name(), &root.key.version, "", "noarch");
    let mut draft = ComponentDraft::new(key, Namespace::Upstream);
    draft.related_url = url.to_string();
    draft.description = root.description.clone();
    draft.license_declared_raw = root.license_declared_raw.clone();
    draft
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::sqlite::test_support::registry;
    use crate::ports::outbound::{ComponentRepository, NodeStore, TaxonomyRepository};
    use crate::taxonomy::domain::{NodePayload, RecordMeta};

    fn record(json: &str) -> BuildRecord {
        serde_json::from_str(json).unwrap()
    }

    fn foo_build() -> BuildRecord {
        record(
            r#"{
                "build_meta": {"build_id": "1", "build_type": "BREW", "name": "foo"},
                "tree": {
                    "type": "RPM",
                    "meta": {"name": "foo", "version": "1.0", "release": "1", "arch": "src",
                             "license": "MIT", "url": "https://example.org/foo"},
                    "components": [
                        {"type": "RPM", "meta": {"name": "foo-libs", "version": "1.0", "release": "1", "arch": "x86_64"}},
                        {"type": "RPM", "meta": {"name": "foo-devel", "version": "1.0", "release": "1", "arch": "x86_64", "dev": true}},
                        {"type": "conda", "meta": {"name": "numpy", "version": "1.24"}},
                        {"type": "pip", "meta": {"version": "2.0"}}
                    ]
                }
            }"#,
        )
    }

    #[test]
    fn test_ingest_builds_tree_and_skips_bad_subtrees() {
        let store = registry();
        let report = ComponentTreeBuilder::new(&store).ingest(&foo_build(), false).unwrap();

        assert_eq!(report.status, IngestStatus::Ingested);
        // root, upstream, libs, devel
        assert_eq!(report.created_nodes.len(), 4);
        assert_eq!(report.skipped.len(), 2);
        assert!(report.skipped.iter().any(|s| s.reason.contains("conda")));
        assert!(report.skipped.iter().any(|s| s.reason.contains("'name'")));

        let build = report.build.unwrap();
        let owned = store.components_for_build(build.id).unwrap();
        let names: Vec<&str> = owned.iter().map(|c| c.name()).collect();
        assert!(names.contains(&"foo"));
        assert!(names.contains(&"foo-libs"));
    }

    #[test]
    fn test_dev_children_get_provides_dev_edges() {
        let store = registry();
        ComponentTreeBuilder::new(&store).ingest(&foo_build(), false).unwrap();

        let devel = store
            .find_component(&ComponentKey::new(ComponentType::Rpm, "foo-devel", "1.0", "1", "x86_64"))
            .unwrap()
            .unwrap();
        let nodes = store.nodes_for_payload(devel.payload_ref()).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].kind(), NodeKind::Component(EdgeType::ProvidesDev));
    }

    #[test]
    fn test_url_creates_upstream_source_node() {
        let store = registry();
        ComponentTreeBuilder::new(&store).ingest(&foo_build(), false).unwrap();

        let upstream = store
            .find_component(&ComponentKey::new(ComponentType::Rpm, "foo", "1.0", "", "noarch"))
            .unwrap()
            .unwrap();
        assert_eq!(upstream.namespace, Namespace::Upstream);
        assert_eq!(upstream.related_url, "https://example.org/foo");
        assert_eq!(upstream.license_declared_raw, "MIT");

        let srpm = store
            .find_component(&ComponentKey::new(ComponentType::Rpm, "foo", "1.0", "1", "src"))
            .unwrap()
            .unwrap();
        let links = store.component_links(srpm.uuid).unwrap();
        assert_eq!(links.upstreams.len(), 1);
        assert_eq!(links.provides.len(), 2);
    }

    #[test]
    fn test_reingest_without_force_is_a_no_op() {
        let store = registry();
        let builder = ComponentTreeBuilder::new(&store);
        builder.ingest(&foo_build(), false).unwrap();

        let again = builder.ingest(&foo_build(), false).unwrap();
        assert_eq!(again.status, IngestStatus::AlreadyIngested);
        assert!(again.created_nodes.is_empty());

        let forced = builder.ingest(&foo_build(), true).unwrap();
        assert_eq!(forced.status, IngestStatus::Ingested);
        assert!(forced.created_nodes.is_empty());
        assert_eq!(forced.components_created, 0);
    }

    #[test]
    fn test_forced_reingest_keeps_license() {
        let store = registry();
        let builder = ComponentTreeBuilder::new(&store);
        builder.ingest(&foo_build(), false).unwrap();

        let mut without_license = foo_build();
        without_license.tree.meta.license = None;
        without_license.tree.meta.description = Some("Foo tools".to_string());
        builder.ingest(&without_license, true).unwrap();

        let srpm = store
            .find_component(&ComponentKey::new(ComponentType::Rpm, "foo", "1.0", "1", "src"))
            .unwrap()
            .unwrap();
        assert_eq!(srpm.license_declared_raw, "MIT");
        assert_eq!(srpm.description, "Foo tools");
    }

    #[test]
    fn test_unsupported_build_type_is_reported() {
        let store = registry();
        let mut unsupported = foo_build();
        unsupported.build_meta.build_type = "PNC".to_string();

        let report = ComponentTreeBuilder::new(&store).ingest(&unsupported, false).unwrap();
        assert_eq!(report.status, IngestStatus::UnsupportedBuildType);
        assert!(report.build.is_none());
        assert_eq!(report.build_label, "PNC:1");
    }

    #[test]
    fn test_binary_in_container_is_not_owned_by_container_build() {
        let store = registry();
        let image = record(
            r#"{
                "build_meta": {"build_id": "50", "build_type": "BREW"},
                "tree": {
                    "type": "OCI",
                    "meta": {"name": "app-container", "version": "1.0", "release": "3", "arch": "x86_64"},
                    "components": [
                        {"type": "RPM", "meta": {"name": "foo-libs", "version": "1.0", "release": "1", "arch": "x86_64"}}
                    ],
                    "sources": [
                        {"type": "gomod", "meta": {"name": "github.com/example/app", "version": "v0.3.0"},
                         "components": [{"type": "gomod", "meta": {"name": "golang.org/x/text", "version": "v0.3.7"}}]}
                    ]
                }
            }"#,
        );
        ComponentTreeBuilder::new(&store).ingest(&image, false).unwrap();

        let libs = store
            .find_component(&ComponentKey::new(ComponentType::Rpm, "foo-libs", "1.0", "1", "x86_64"))
            .unwrap()
            .unwrap();
        assert_eq!(libs.software_build, None);

        let module = store
            .find_component(&ComponentKey::new(ComponentType::Golang, "github.com/example/app", "v0.3.0", "", "noarch"))
            .unwrap()
            .unwrap();
        assert_eq!(module.namespace, Namespace::Upstream);
        assert_eq!(
            module.meta_attr.get("go_component_type"),
            Some(&Value::String("gomod".to_string()))
        );
        let nodes = store.nodes_for_payload(module.payload_ref()).unwrap();
        assert_eq!(nodes[0].kind(), NodeKind::Component(EdgeType::Source));
    }

    #[test]
    fn test_missing_version_rejected_except_for_generic() {
        let mut record = ComponentRecord {
            component_type: "RPM".to_string(),
            namespace: None,
            meta: RecordMeta {
                name: Some("foo".to_string()),
                ..Default::default()
            },
            components: Vec::new(),
            sources: Vec::new(),
        };
        assert!(component_draft(&record, TreePosition::Child).is_err());

        record.component_type = "GENERIC".to_string();
        let draft = component_draft(&record, TreePosition::Child).unwrap();
        assert_eq!(draft.key.arch, "noarch");
        assert_eq!(draft.namespace, Namespace::Upstream);
    }
}
