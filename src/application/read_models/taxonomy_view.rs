//! Recursive taxonomy view returned by the `taxonomy` query

use serde::Serialize;
use std::collections::BTreeMap;

/// One node of a rendered tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonomyNodeView {
    /// purl for components, name for product entities
    pub identity: String,
    /// `component/<uuid>` for components, the ofuri for product models
    pub link: String,
    /// Edge type or product level of the node
    pub edge: String,
    pub children: Vec<TaxonomyNodeView>,
}

impl TaxonomyNodeView {
    /// Number of nodes in this subtree, itself included
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TaxonomyNodeView::size).sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonomyView {
    pub target: String,
    /// One tree per node the target owns
    pub trees: Vec<TaxonomyNodeView>,
    /// Names of the related product entities by level; product targets only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_family: Option<BTreeMap<String, Vec<String>>>,
}
