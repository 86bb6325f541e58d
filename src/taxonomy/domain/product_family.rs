use super::node::Node;
use super::product::ProductLevel;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Set of product entities grouped by level.
///
/// Used both for the family of a stream (its ancestors and descendants)
/// and for the derived links stored on a component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFamily {
    members: BTreeMap<ProductLevel, BTreeSet<Uuid>>,
}

impl ProductFamily {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, level: ProductLevel, entity: Uuid) -> bool {
        self.members.entry(level).or_default().insert(entity)
    }

    /// Adds every product node's payload, ignoring component nodes
    pub fn extend_from_nodes<'a>(&mut self, nodes: impl IntoIterator<Item = &'a Node>) {
        for node in nodes {
            if let Some(level) = node.kind().level() {
                self.insert(level, node.payload().id);
            }
        }
    }

    pub fn union_with(&mut self, other: &ProductFamily) {
        for (level, entities) in &other.members {
            self.members
                .entry(*level)
                .or_default()
                .extend(entities.iter().copied());
        }
    }

    pub fn get(&self, level: ProductLevel) -> impl Iterator<Item = &Uuid> {
        self.members.get(&level).into_iter().flatten()
    }

    pub fn contains(&self, level: ProductLevel, entity: &Uuid) -> bool {
        self.members
            .get(&level)
            .is_some_and(|entities| entities.contains(entity))
    }

    pub fn count(&self, level: ProductLevel) -> usize {
        self.members.get(&level).map_or(0, BTreeSet::len)
    }

    pub fn len(&self) -> usize {
        self.members.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (level, entity) pairs in level order
    pub fn iter(&self) -> impl Iterator<Item = (ProductLevel, Uuid)> + '_ {
        self.members
            .iter()
            .flat_map(|(level, entities)| entities.iter().map(move |id| (*level, *id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_keeps_levels_apart() {
        let stream = Uuid::new_v4();
        let variant = Uuid::new_v4();
        let mut a = ProductFamily::new();
        a.insert(ProductLevel::ProductStream, stream);

        let mut b = ProductFamily::new();
        b.insert(ProductLevel::ProductStream, stream);
        b.insert(ProductLevel::ProductVariant, variant);

        a.union_with(&b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.count(ProductLevel::ProductStream), 1);
        assert!(a.contains(ProductLevel::ProductVariant, &variant));
        assert!(!a.contains(ProductLevel::ProductStream, &variant));
    }

    #[test]
    fn test_empty_family() {
        let family = ProductFamily::new();
        assert!(family.is_empty());
        assert_eq!(family.get(ProductLevel::Channel).count(), 0);
    }
}
