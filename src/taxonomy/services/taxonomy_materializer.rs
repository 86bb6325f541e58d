use crate::ports::outbound::RegistryStore;
use crate::shared::Result;
use crate::taxonomy::domain::{
    BuildKey, Node, NodeFamily, NodeId, NodePayload, ProductFamily, ProductLevel, SoftwareBuild,
};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// False when the build has not been ingested yet; nothing was written
    pub build_found: bool,
    pub streams: Vec<String>,
    pub components: usize,
    pub links_added: usize,
    /// product_refs with no matching stream or variant
    pub unresolved_refs: Vec<String>,
}

/// Progress of a verify-and-repair sweep; `last_key` is where to resume
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub processed: usize,
    pub repaired: usize,
    pub last_key: Option<i64>,
}

/// TaxonomyMaterializer service writing derived product links onto components
///
/// Materialization only adds links. A component reachable from a build's
/// roots receives the family of every stream the build's evidence points
/// at; [`TaxonomyMaterializer::rederive`] is the one path that takes links
/// away, after the product tree changed shape.
pub struct TaxonomyMaterializer<'a, S: RegistryStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RegistryStore + ?Sized> TaxonomyMaterializer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn materialize(&self, key: &BuildKey) -> Result<MaterializeReport> {
        let Some(build) = self.store.find_build(key)? else {
            tracing::debug!(build = %key, "build not ingested yet; nothing to materialize");
            return Ok(MaterializeReport::default());
        };
        let mut report = MaterializeReport {
            build_found: true,
            ..Default::default()
        };

        let streams = self.resolve_streams(key, &mut report)?;

        // One family per stream, then the union. Walking from a union of
        // streams would pull in variants of one stream for another.
        let mut family = ProductFamily::new();
        for stream_node in streams.values() {
            let mut stream_family = ProductFamily::new();
            stream_family.extend_from_nodes(&self.store.ancestors(stream_node, true)?);
            stream_family.extend_from_nodes(&self.store.descendants(stream_node, true)?);
            family.union_with(&stream_family);
            report.streams.push(stream_node.identity().to_string());
        }
        report.streams.sort();
        report.streams.dedup();

        let components: Vec<Uuid> = self.tree_components(&build)?.into_iter().collect();
        report.components = components.len();
        if !family.is_empty() && !components.is_empty() {
            report.links_added = self.store.add_product_links(&components, &family)?;
        }

        tracing::info!(
            build = %key,
            streams = report.streams.len(),
            components = report.components,
            links_added = report.links_added,
            "materialized taxonomy"
        );
        Ok(report)
    }

    /// Stream nodes named by the build's evidence, with variants folded into
    /// every stream they sit under
    fn resolve_streams(
        &self,
        key: &BuildKey,
        report: &mut MaterializeReport,
    ) -> Result<BTreeMap<NodeId, Node>> {
        let mut streams = BTreeMap::new();
        let refs: BTreeSet<(ProductLevel, String)> = self
            .store
            .relations_for_build(key)?
            .into_iter()
            .map(|relation| (relation.relation_type.refers_to(), relation.product_ref))
            .collect();

        for (level, product_ref) in refs {
            let Some(model) = self.store.find_product_model(level, &product_ref)? else {
                tracing::debug!(build = %key, product_ref = %product_ref, level = %level, "evidence names an unknown product entity");
                report.unresolved_refs.push(product_ref);
                continue;
            };
            for node in self.store.nodes_for_payload(model.payload_ref())? {
                if level == ProductLevel::ProductStream {
                    streams.insert(node.id(), node);
                    continue;
                }
                for ancestor in self.store.ancestors(&node, false)? {
                    if ancestor.kind().level() == Some(ProductLevel::ProductStream) {
                        streams.insert(ancestor.id(), ancestor);
                    }
                }
            }
        }
        Ok(streams)
    }

    /// Every component reachable from the root nodes the build owns
    pub fn tree_components(&self, build: &SoftwareBuild) -> Result<BTreeSet<Uuid>> {
        let mut members = BTreeSet::new();
        for component in self.store.components_for_build(build.id)? {
            for node in self.store.nodes_for_payload(component.payload_ref())? {
                if !node.is_root() || node.family() != NodeFamily::Component {
                    continue;
                }
                members.extend(
                    self.store
                        .descendants(&node, true)?
                        .into_iter()
                        .map(|descendant| descendant.payload().id),
                );
            }
        }
        Ok(members)
    }

    /// Drops `stale` links from the trees of `builds`, then re-materializes
    /// every build whose tree reaches one of those components.
    ///
    /// Called when the product tree changed shape under existing evidence.
    /// Links the remaining evidence still supports come back; the count of
    /// removed links is returned.
    pub fn rederive(&self, builds: &[BuildKey], stale: &ProductFamily) -> Result<usize> {
        let mut components = BTreeSet::new();
        for key in builds {
            if let Some(build) = self.store.find_build(key)? {
                components.extend(self.tree_components(&build)?);
            }
        }
        if components.is_empty() || stale.is_empty() {
            return Ok(0);
        }

        let members: Vec<Uuid> = components.iter().copied().collect();
        let removed = self.store.remove_product_links(&members, stale)?;
        let owners = self.owning_builds(&components)?;
        for key in &owners {
            self.materialize(key)?;
        }
        tracing::info!(
            builds = builds.len(),
            components = members.len(),
            removed,
            rematerialized = owners.len(),
            "re-derived product links"
        );
        Ok(removed)
    }

    /// Builds owning a root whose tree holds any of `components`
    fn owning_builds(&self, components: &BTreeSet<Uuid>) -> Result<BTreeSet<BuildKey>> {
        let mut owners = BTreeSet::new();
        let mut roots = BTreeSet::new();
        for uuid in components {
            let Some(component) = self.store.get_component(*uuid)? else {
                continue;
            };
            for node in self.store.nodes_for_payload(component.payload_ref())? {
                let root = self.store.root_of(&node)?;
                if !roots.insert(root.id()) {
                    continue;
                }
                let Some(build_id) = self
                    .store
                    .get_component(root.payload().id)?
                    .and_then(|root_component| root_component.software_build)
                else {
                    continue;
                };
                if let Some(build) = self.store.get_build(build_id)? {
                    owners.insert(build.key);
                }
            }
        }
        Ok(owners)
    }

    /// Re-materializes builds whose components lack stream links.
    ///
    /// Builds are visited in key order after `resume_after`, `batch_size` at
    /// a time; `on_batch` sees the running totals after each batch.
    pub fn repair(
        &self,
        resume_after: Option<i64>,
        batch_size: usize,
        mut on_batch: impl FnMut(&RepairReport),
    ) -> Result<RepairReport> {
        let mut report = RepairReport {
            last_key: resume_after,
            ..Default::default()
        };
        loop {
            let batch = self.store.builds_after(report.last_key, batch_size.max(1))?;
            if batch.is_empty() {
                break;
            }
            for build in &batch {
                if self.needs_repair(build)? {
                    tracing::info!(build = %build.key, "repairing incomplete taxonomy");
                    self.materialize(&build.key)?;
                    report.repaired += 1;
                }
                report.processed += 1;
                report.last_key = Some(build.id);
            }
            on_batch(&report);
        }
        Ok(report)
    }

    fn needs_repair(&self, build: &SoftwareBuild) -> Result<bool> {
        if self.store.relations_for_build(&build.key)?.is_empty() {
            return Ok(false);
        }
        let components: Vec<Uuid> = self.tree_components(build)?.into_iter().collect();
        if components.is_empty() {
            return Ok(false);
        }
        let linked = self
            .store
            .count_linked(&components, ProductLevel::ProductStream)?;
        Ok(linked != components.len())
    }
}
