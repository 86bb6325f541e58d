use crate::ports::outbound::RegistryStore;
use crate::shared::error::RegistryError;
use crate::shared::Result;
use crate::taxonomy::domain::{Component, ComponentType, NodePayload, ProductLevel, ProductModel};
use crate::taxonomy::policies::{RankKey, ReleaseRanking};
use std::collections::BTreeMap;

/// Grouping key for "the same component" across builds
type RootGroup = (ComponentType, String, String);

/// LatestRootSelector service picking the current build of each component in a stream
pub struct LatestRootSelector<'a, S: RegistryStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RegistryStore + ?Sized> LatestRootSelector<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The single best root component per (type, name, arch) linked to `stream`.
    ///
    /// Results are sorted by purl.
    pub fn latest_roots(&self, stream: &str) -> Result<Vec<Component>> {
        let model = self.stream(stream)?;
        let linked = self.linked_components(&model)?;

        let mut roots = Vec::with_capacity(linked.len());
        for component in linked {
            if self.is_root(&component)? {
                roots.push(component);
            }
        }
        tracing::debug!(stream = %stream, candidates = roots.len(), "ranking root components");
        self.pick_latest(roots)
    }

    /// Latest build of every component linked to `stream`, roots or not.
    ///
    /// Inactive streams list nothing unless `include_inactive` is set.
    pub fn latest_components(&self, stream: &str, include_inactive: bool) -> Result<Vec<Component>> {
        let model = self.stream(stream)?;
        let active = model.stream.as_ref().is_none_or(|details| details.active);
        if !active && !include_inactive {
            tracing::info!(stream = %stream, "stream is inactive; no components listed");
            return Ok(Vec::new());
        }
        let linked = self.linked_components(&model)?;
        self.pick_latest(linked)
    }

    fn stream(&self, name: &str) -> Result<ProductModel> {
        self.store
            .find_product_model(ProductLevel::ProductStream, name)?
            .ok_or_else(|| {
                RegistryError::NotFound {
                    entity: "Product stream",
                    key: name.to_string(),
                    hint: "Load the product definitions that declare this stream first".to_string(),
                }
                .into()
            })
    }

    fn linked_components(&self, model: &ProductModel) -> Result<Vec<Component>> {
        let mut components = Vec::new();
        for uuid in self
            .store
            .components_linked_to(ProductLevel::ProductStream, model.uuid)?
        {
            match self.store.get_component(uuid)? {
                Some(component) => components.push(component),
                None => tracing::warn!(component = %uuid, "product link points to a missing component"),
            }
        }
        Ok(components)
    }

    /// A component is a root when none of its nodes hangs off a PROVIDES edge
    fn is_root(&self, component: &Component) -> Result<bool> {
        let nodes = self.store.nodes_for_payload(component.payload_ref())?;
        Ok(!nodes
            .iter()
            .any(|node| node.kind().edge_type().is_some_and(|edge| edge.is_provides())))
    }

    fn pick_latest(&self, candidates: Vec<Component>) -> Result<Vec<Component>> {
        let mut groups: BTreeMap<RootGroup, Vec<(RankKey, Component)>> = BTreeMap::new();
        for component in candidates {
            let completion_time = match component.software_build {
                Some(id) => self.store.get_build(id)?.and_then(|build| build.completion_time),
                None => None,
            };
            let key = ReleaseRanking::key(&component.key.version, &component.key.release, completion_time);
            let group = (
                component.component_type(),
                component.key.name.clone(),
                component.key.arch.clone(),
            );
            groups.entry(group).or_default().push((key, component));
        }

        let mut latest: Vec<Component> = groups
            .into_values()
            .filter_map(|mut members| {
                members.sort_by(|a, b| {
                    ReleaseRanking::compare((&a.0, &a.1.purl), (&b.0, &b.1.purl))
                });
                members.into_iter().next().map(|(_, component)| component)
            })
            .collect();
        latest.sort_by(|a, b| a.purl.cmp(&b.purl));
        Ok(latest)
    }
}
