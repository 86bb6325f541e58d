use crate::ports::outbound::RegistryStore;
use crate::shared::error::RegistryError;
use crate::shared::Result;
use crate::taxonomy::domain::{BuildKey, NodeFamily, NodePayload};
use crate::taxonomy::services::{ComponentTaxonomy, TaxonomyMaterializer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteBuildReport {
    pub nodes_removed: usize,
    /// Former tree members that still have other positions and got fresh links
    pub components_relinked: usize,
}

/// DeleteBuildUseCase - maintenance removal of one build's trees
///
/// Root subtrees owned by the build are deleted whole, then the remaining
/// members' component links are recomputed, then the build row goes.
/// Components and product links stay: they may be shared with other builds.
pub struct DeleteBuildUseCase<'a, S: RegistryStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RegistryStore + ?Sized> DeleteBuildUseCase<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn execute(&self, key: &BuildKey) -> Result<DeleteBuildReport> {
        let build = self.store.find_build(key)?.ok_or_else(|| RegistryError::NotFound {
            entity: "Build",
            key: key.to_string(),
            hint: "Check the build id and build type".to_string(),
        })?;

        let members = TaxonomyMaterializer::new(self.store).tree_components(&build)?;
        let mut report = DeleteBuildReport::default();
        for component in self.store.components_for_build(build.id)? {
            for node in self.store.nodes_for_payload(component.payload_ref())? {
                if node.is_root() && node.family() == NodeFamily::Component {
                    report.nodes_removed += self.store.delete_subtree(&node)?;
                }
            }
        }

        let taxonomy = ComponentTaxonomy::new(self.store);
        for uuid in members {
            let Some(component) = self.store.get_component(uuid)? else {
                continue;
            };
            let links = taxonomy.compute(&component)?;
            self.store.replace_component_links(uuid, &links)?;
            report.components_relinked += 1;
        }

        self.store.delete_build(build.id)?;
        tracing::info!(
            build = %key,
            nodes_removed = report.nodes_removed,
            relinked = report.components_relinked,
            "deleted build"
        );
        Ok(report)
    }
}
