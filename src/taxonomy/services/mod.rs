mod component_taxonomy;
mod component_tree_builder;
mod latest_root_selector;
mod manifest_builder;
mod product_tree_builder;
mod relation_loader;
mod taxonomy_materializer;

pub use component_taxonomy::ComponentTaxonomy;
pub use component_tree_builder::{
    component_draft, ComponentTreeBuilder, IngestReport, IngestStatus, SkippedSubtree,
    MAX_TREE_DEPTH,
};
pub use latest_root_selector::LatestRootSelector;
pub use manifest_builder::{Manifest, ManifestBuilder, ManifestSubject};
pub use product_tree_builder::{Detachment, ProductLoadReport, ProductTreeBuilder, Reparenting};
pub use relation_loader::{RelationLoadReport, RelationLoader};
pub use taxonomy_materializer::{MaterializeReport, RepairReport, TaxonomyMaterializer};
