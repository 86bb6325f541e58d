use crate::ports::outbound::RegistryStore;
use crate::shared::Result;
use crate::taxonomy::domain::{
    Component, ComponentLinks, ComponentType, EdgeType, Namespace, Node, NodePayload,
};
use std::collections::BTreeSet;
use uuid::Uuid;

const RPM_PURL_PREFIX: &str = "pkg:rpm/";

/// ComponentTaxonomy service for the provides / sources / upstreams links
///
/// The links are a pure function of the component's tree positions, so
/// saving them replaces whatever was stored before.
pub struct ComponentTaxonomy<'a, S: RegistryStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RegistryStore + ?Sized> ComponentTaxonomy<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Computes the links of one component from its current nodes
    pub fn compute(&self, component: &Component) -> Result<ComponentLinks> {
        let nodes = self.store.nodes_for_payload(component.payload_ref())?;
        let mut links = ComponentLinks::default();

        for node in &nodes {
            for descendant in self.store.descendants(node, false)? {
                if is_provides(&descendant) {
                    links.provides.insert(descendant.payload().id);
                }
            }
            if is_provides(node) {
                for ancestor in self.store.ancestors(node, false)? {
                    links.sources.insert(ancestor.payload().id);
                }
            }
        }

        if component.software_build.is_some() {
            links.upstreams = self.upstreams(&nodes)?;
        }
        links.provides.remove(&component.uuid);
        links.sources.remove(&component.uuid);
        links.upstreams.remove(&component.uuid);
        Ok(links)
    }

    /// Recomputes and stores the links of every component in a tree.
    ///
    /// Returns the number of components whose links were saved.
    pub fn save_for_tree(&self, root: &Node) -> Result<usize> {
        let members: BTreeSet<Uuid> = self
            .store
            .descendants(root, true)?
            .into_iter()
            .map(|node| node.payload().id)
            .collect();

        let mut saved = 0;
        for uuid in members {
            let Some(component) = self.store.get_component(uuid)? else {
                tracing::warn!(component = %uuid, "node points to a missing component; links not saved");
                continue;
            };
            let links = self.compute(&component)?;
            self.store.replace_component_links(uuid, &links)?;
            saved += 1;
        }
        tracing::debug!(root = %root.identity(), saved, "saved component taxonomy");
        Ok(saved)
    }

    /// SOURCE descendants of the roots this component is built under.
    ///
    /// A container root does not count for a node that is, or sits below,
    /// an RPM: RPMs share their upstreams with their SRPM, not with the
    /// image that bundles them. Noarch container images with several source
    /// children nest each component under its own source, so for those the
    /// upstreams are the UPSTREAM sources on the node's own ancestor chain.
    fn upstreams(&self, nodes: &[Node]) -> Result<BTreeSet<Uuid>> {
        let mut upstreams = BTreeSet::new();
        for node in nodes {
            let root = self.store.root_of(node)?;
            let Some(root_component) = self.store.get_component(root.payload().id)? else {
                continue;
            };

            let is_container = root_component.component_type() == ComponentType::ContainerImage;
            if is_container && self.has_rpm_on_chain(node)? {
                continue;
            }

            let sources: Vec<Node> = self
                .store
                .descendants(&root, false)?
                .into_iter()
                .filter(|candidate| candidate.kind().edge_type() == Some(EdgeType::Source))
                .collect();

            if is_container && root_component.key.arch == "noarch" && sources.len() > 1 {
                for ancestor in self.store.ancestors(node, true)? {
                    if ancestor.kind().edge_type() != Some(EdgeType::Source) || ancestor.is_root() {
                        continue;
                    }
                    let upstream = self.store.get_component(ancestor.payload().id)?;
                    if upstream.is_some_and(|c| c.namespace == Namespace::Upstream) {
                        upstreams.insert(ancestor.payload().id);
                    }
                }
            } else {
                upstreams.extend(sources.iter().map(|source| source.payload().id));
            }
        }
        Ok(upstreams)
    }

    fn has_rpm_on_chain(&self, node: &Node) -> Result<bool> {
        Ok(self
            .store
            .ancestors(node, true)?
            .iter()
            .any(|ancestor| ancestor.identity().starts_with(RPM_PURL_PREFIX)))
    }
}

fn is_provides(node: &Node) -> bool {
    node.kind().edge_type().is_some_and(EdgeType::is_provides)
}
