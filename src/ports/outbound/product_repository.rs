use crate::shared::Result;
use crate::taxonomy::domain::{Channel, ChannelDraft, ProductLevel, ProductModel, ProductModelDraft};
use uuid::Uuid;

/// ProductRepository port for product models and channels
///
/// Names are unique per level, so `(level, name)` is the natural key.
pub trait ProductRepository {
    /// Creates the model or updates its attributes and lineage
    fn save_product_model(&self, draft: &ProductModelDraft) -> Result<(ProductModel, bool)>;

    fn find_product_model(&self, level: ProductLevel, name: &str) -> Result<Option<ProductModel>>;

    fn get_product_model(&self, level: ProductLevel, uuid: Uuid) -> Result<Option<ProductModel>>;

    fn find_by_ofuri(&self, ofuri: &str) -> Result<Option<ProductModel>>;

    fn list_product_models(&self, level: ProductLevel) -> Result<Vec<ProductModel>>;

    fn save_channel(&self, draft: &ChannelDraft) -> Result<(Channel, bool)>;

    fn find_channel(&self, name: &str) -> Result<Option<Channel>>;

    fn get_channel(&self, uuid: Uuid) -> Result<Option<Channel>>;
}
