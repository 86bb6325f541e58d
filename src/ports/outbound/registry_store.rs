use super::{
    ComponentRepository, ManifestRepository, NodeStore, ProductRepository, RelationRepository,
    TaxonomyRepository,
};
use crate::shared::Result;
use crate::taxonomy::domain::{Payload, PayloadKind, PayloadRef, ProductLevel};

/// Everything the services need from storage, in one bound
pub trait RegistryStore:
    NodeStore
    + ComponentRepository
    + ProductRepository
    + RelationRepository
    + TaxonomyRepository
    + ManifestRepository
{
    /// Loads the record a node points to, dispatching on the payload kind
    fn resolve_payload(&self, payload: PayloadRef) -> Result<Option<Payload>> {
        let id = payload.id;
        Ok(match payload.kind {
            PayloadKind::Component => self.get_component(id)?.map(Payload::Component),
            PayloadKind::Product => self
                .get_product_model(ProductLevel::Product, id)?
                .map(Payload::Product),
            PayloadKind::ProductVersion => self
                .get_product_model(ProductLevel::ProductVersion, id)?
                .map(Payload::ProductVersion),
            PayloadKind::ProductStream => self
                .get_product_model(ProductLevel::ProductStream, id)?
                .map(Payload::ProductStream),
            PayloadKind::ProductVariant => self
                .get_product_model(ProductLevel::ProductVariant, id)?
                .map(Payload::ProductVariant),
            PayloadKind::Channel => self.get_channel(id)?.map(Payload::Channel),
        })
    }
}

impl<T> RegistryStore for T where
    T: NodeStore
        + ComponentRepository
        + ProductRepository
        + RelationRepository
        + TaxonomyRepository
        + ManifestRepository
{
}
