/// Policies - business rules shared by the services
pub mod namespace;
pub mod release_ranking;
pub mod type_mapping;

pub use namespace::{NamespacePolicy, TreePosition};
pub use release_ranking::{RankKey, ReleaseRanking, Token};
pub use type_mapping::{MappedType, TypeMapping};
