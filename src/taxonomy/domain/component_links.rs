use std::collections::BTreeSet;
use uuid::Uuid;

/// Kind of a derived component-to-component link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkKind {
    Provides,
    Sources,
    Upstreams,
}

impl LinkKind {
    pub const ALL: [LinkKind; 3] = [LinkKind::Provides, LinkKind::Sources, LinkKind::Upstreams];

    pub fn as_str(self) -> &'static str {
        match self {
            LinkKind::Provides => "PROVIDES",
            LinkKind::Sources => "SOURCES",
            LinkKind::Upstreams => "UPSTREAMS",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "PROVIDES" => Some(LinkKind::Provides),
            "SOURCES" => Some(LinkKind::Sources),
            "UPSTREAMS" => Some(LinkKind::Upstreams),
            _ => None,
        }
    }
}

/// Provides/sources/upstreams of one component, derived from the component tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentLinks {
    pub provides: BTreeSet<Uuid>,
    pub sources: BTreeSet<Uuid>,
    pub upstreams: BTreeSet<Uuid>,
}

impl ComponentLinks {
    pub fn get(&self, kind: LinkKind) -> &BTreeSet<Uuid> {
        match kind {
            LinkKind::Provides => &self.provides,
            LinkKind::Sources => &self.sources,
            LinkKind::Upstreams => &self.upstreams,
        }
    }

    pub fn get_mut(&mut self, kind: LinkKind) -> &mut BTreeSet<Uuid> {
        match kind {
            LinkKind::Provides => &mut self.provides,
            LinkKind::Sources => &mut self.sources,
            LinkKind::Upstreams => &mut self.upstreams,
        }
    }

    pub fn len(&self) -> usize {
        self.provides.len() + self.sources.len() + self.upstreams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_kind_tags() {
        for kind in LinkKind::ALL {
            assert_eq!(LinkKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(LinkKind::parse("REQUIRES"), None);
    }

    #[test]
    fn test_get_mut_targets_one_set() {
        let mut links = ComponentLinks::default();
        links.get_mut(LinkKind::Upstreams).insert(Uuid::new_v4());
        assert_eq!(links.len(), 1);
        assert!(links.provides.is_empty());
        assert!(!links.is_empty());
    }
}
