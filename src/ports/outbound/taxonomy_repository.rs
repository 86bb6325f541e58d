use crate::shared::Result;
use crate::taxonomy::domain::{ComponentLinks, ProductFamily, ProductLevel};
use uuid::Uuid;

/// TaxonomyRepository port for the derived link tables
///
/// Product links are additive: adding never removes, and removal only
/// happens through [`TaxonomyRepository::remove_product_links`] when the
/// product tree changes shape. Component
/// links are replaced as a whole because they are a function of the trees.
pub trait TaxonomyRepository {
    /// Adds every (component, entity) pair in one transaction, returning the new row count
    fn add_product_links(&self, components: &[Uuid], family: &ProductFamily) -> Result<usize>;

    /// Removes the links from `components` to any entity of `family`
    fn remove_product_links(&self, components: &[Uuid], family: &ProductFamily) -> Result<usize>;

    fn product_links(&self, component: Uuid) -> Result<ProductFamily>;

    fn components_linked_to(&self, level: ProductLevel, entity: Uuid) -> Result<Vec<Uuid>>;

    /// How many of `components` carry at least one link at `level`
    fn count_linked(&self, components: &[Uuid], level: ProductLevel) -> Result<usize>;

    fn replace_component_links(&self, component: Uuid, links: &ComponentLinks) -> Result<()>;

    fn component_links(&self, component: Uuid) -> Result<ComponentLinks>;
}
