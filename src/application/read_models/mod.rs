//! Read models for CQRS-lite pattern
//!
//! View-shaped structs for the query side: the latest-component listing
//! and the recursive taxonomy view. Nothing here is stored.

mod component_view;
mod taxonomy_view;
mod taxonomy_view_builder;

pub use component_view::{ComponentListView, ComponentView};
pub use taxonomy_view::{TaxonomyNodeView, TaxonomyView};
pub use taxonomy_view_builder::TaxonomyViewBuilder;
