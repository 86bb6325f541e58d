use crate::shared::Result;
use crate::taxonomy::domain::{BuildKey, NewRelation, ProductComponentRelation, SoftwareBuild};

/// RelationRepository port for the bridge table of build-to-product evidence
pub trait RelationRepository {
    /// Inserts one evidence row; an existing natural key is a no-op.
    ///
    /// # Returns
    /// Whether a new row was written
    fn add_relation(&self, relation: &NewRelation) -> Result<bool>;

    fn relations_for_build(&self, key: &BuildKey) -> Result<Vec<ProductComponentRelation>>;

    /// Builds with evidence naming `product_ref`, skipping unsupported build types
    fn builds_for_product_ref(&self, product_ref: &str) -> Result<Vec<BuildKey>>;

    /// Points evidence rows for this build at its SoftwareBuild row
    fn link_relations_to_build(&self, build: &SoftwareBuild) -> Result<usize>;
}
