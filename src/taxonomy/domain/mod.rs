/// Domain layer - entities, value objects and input record shapes
pub mod component;
pub mod component_links;
pub mod definitions;
pub mod ingestion;
pub mod node;
pub mod product;
pub mod product_family;
pub mod purl;
pub mod relation;
pub mod software_build;

pub use component::{Component, ComponentDraft, ComponentKey, ComponentType, Namespace};
pub use component_links::{ComponentLinks, LinkKind};
pub use definitions::{
    ChannelRecord, ProductDefinitions, ProductRecord, StreamRecord, TagBuilds, VariantRecord,
    VersionRecord,
};
pub use ingestion::{BuildMeta, BuildRecord, ComponentRecord, RecordMeta};
pub use node::{
    EdgeType, Node, NodeFamily, NodeId, NodeKind, NodePayload, Payload, PayloadKind, PayloadRef,
};
pub use product::{
    Channel, ChannelDraft, ChannelType, Lineage, Ofuri, ProductLevel, ProductModel, ProductModelDraft,
    StreamDetails,
};
pub use product_family::ProductFamily;
pub use purl::PackageUrl;
pub use relation::{NewRelation, ProductComponentRelation, RelationType};
pub use software_build::{BuildKey, BuildType, SoftwareBuild, SoftwareBuildDraft};
