//! Builder for the recursive taxonomy view of a component or product entity

use super::taxonomy_view::{TaxonomyNodeView, TaxonomyView};
use crate::ports::outbound::RegistryStore;
use crate::shared::error::RegistryError;
use crate::shared::Result;
use crate::taxonomy::domain::{
    EdgeType, Node, NodeFamily, NodeId, NodePayload, Payload, PayloadRef, ProductLevel,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

const PURL_PREFIX: &str = "pkg:";
const OFURI_PREFIX: &str = "o:";

/// Builds [`TaxonomyView`]s from the stored trees.
///
/// Targets are resolved as a purl (`pkg:...`), an ofuri (`o:...`), or
/// otherwise a product entity name, tried level by level from PRODUCT down
/// to CHANNEL.
pub struct TaxonomyViewBuilder<'a, S: RegistryStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RegistryStore + ?Sized> TaxonomyViewBuilder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Renders every tree position of `target`.
    ///
    /// # Arguments
    /// * `target` - purl, ofuri or product entity name
    /// * `edges` - component edge types to follow; empty follows all
    pub fn build(&self, target: &str, edges: &[EdgeType]) -> Result<TaxonomyView> {
        let payload = self.resolve_target(target)?;
        let nodes = self.store.nodes_for_payload(payload)?;

        let mut trees = Vec::with_capacity(nodes.len());
        let mut family: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for node in &nodes {
            let mut children: HashMap<NodeId, Vec<Node>> = HashMap::new();
            for descendant in self.store.descendants(node, false)? {
                if let Some(parent) = descendant.parent_id() {
                    children.entry(parent).or_default().push(descendant);
                }
            }
            for siblings in children.values_mut() {
                siblings.sort_by(|a, b| a.identity().cmp(b.identity()));
            }
            trees.push(self.render(node, &children, edges)?);

            if node.family() == NodeFamily::Product {
                let related = self
                    .store
                    .ancestors(node, false)?
                    .into_iter()
                    .chain(self.store.descendants(node, false)?);
                for relative in related {
                    if let Some(level) = relative.kind().level() {
                        family
                            .entry(level.as_str().to_lowercase())
                            .or_default()
                            .insert(relative.identity().to_string());
                    }
                }
            }
        }

        let is_product = payload.kind.family() == NodeFamily::Product;
        Ok(TaxonomyView {
            target: target.to_string(),
            trees,
            product_family: is_product.then(|| {
                family
                    .into_iter()
                    .map(|(level, names)| (level, names.into_iter().collect()))
                    .collect()
            }),
        })
    }

    fn resolve_target(&self, target: &str) -> Result<PayloadRef> {
        let found = if target.starts_with(PURL_PREFIX) {
            self.store
                .find_component_by_purl(target)?
                .map(|component| component.payload_ref())
        } else if target.starts_with(OFURI_PREFIX) {
            self.store.find_by_ofuri(target)?.map(|model| model.payload_ref())
        } else {
            self.find_by_name(target)?
        };
        found.ok_or_else(|| {
            RegistryError::NotFound {
                entity: "Taxonomy target",
                key: target.to_string(),
                hint: "Use a purl, an ofuri, or the name of a loaded product entity".to_string(),
            }
            .into()
        })
    }

    fn find_by_name(&self, name: &str) -> Result<Option<PayloadRef>> {
        for level in ProductLevel::MODEL_LEVELS {
            if let Some(model) = self.store.find_product_model(level, name)? {
                return Ok(Some(model.payload_ref()));
            }
        }
        Ok(self
            .store
            .find_channel(name)?
            .map(|channel| channel.payload_ref()))
    }

    fn render(
        &self,
        node: &Node,
        children: &HashMap<NodeId, Vec<Node>>,
        edges: &[EdgeType],
    ) -> Result<TaxonomyNodeView> {
        let mut view = TaxonomyNodeView {
            identity: node.identity().to_string(),
            link: self.link(node)?,
            edge: node.kind().as_str().to_string(),
            children: Vec::new(),
        };
        for child in children.get(&node.id()).into_iter().flatten() {
            let excluded = child
                .kind()
                .edge_type()
                .is_some_and(|edge| !edges.is_empty() && !edges.contains(&edge));
            if !excluded {
                view.children.push(self.render(child, children, edges)?);
            }
        }
        Ok(view)
    }

    /// Product models link by ofuri; everything else by payload reference
    fn link(&self, node: &Node) -> Result<String> {
        let payload = node.payload();
        if node.family() == NodeFamily::Component {
            return Ok(payload.link());
        }
        let ofuri = match self.store.resolve_payload(payload)? {
            Some(Payload::Product(model))
            | Some(Payload::ProductVersion(model))
            | Some(Payload::ProductStream(model))
            | Some(Payload::ProductVariant(model)) => model.ofuri,
            _ => String::new(),
        };
        Ok(if ofuri.is_empty() { payload.link() } else { ofuri })
    }
}
