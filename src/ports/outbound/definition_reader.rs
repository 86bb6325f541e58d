use crate::shared::Result;
use crate::taxonomy::domain::{NewRelation, ProductDefinitions, TagBuilds};
use std::path::Path;

/// DefinitionReader port for product definitions and evidence files
pub trait DefinitionReader {
    /// Reads a product-definition tree (YAML or JSON)
    fn read_products(&self, path: &Path) -> Result<ProductDefinitions>;

    /// Reads a JSON array of bridge records
    fn read_relations(&self, path: &Path) -> Result<Vec<NewRelation>>;

    /// Reads a brew tag to build-id listing
    fn read_tag_builds(&self, path: &Path) -> Result<TagBuilds>;
}
