use super::{Channel, Component, ProductLevel, ProductModel};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of a node row within its tree family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(i64);

impl NodeId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two independent forests kept by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeFamily {
    Component,
    Product,
}

/// Relationship of a component node to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    Source,
    Provides,
    ProvidesDev,
    Requires,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::Source => "SOURCE",
            EdgeType::Provides => "PROVIDES",
            EdgeType::ProvidesDev => "PROVIDES_DEV",
            EdgeType::Requires => "REQUIRES",
        }
    }

    /// PROVIDES and PROVIDES_DEV both make the child a provided component
    pub fn is_provides(self) -> bool {
        matches!(self, EdgeType::Provides | EdgeType::ProvidesDev)
    }
}

impl FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "SOURCE" => Ok(EdgeType::Source),
            "PROVIDES" => Ok(EdgeType::Provides),
            "PROVIDES_DEV" => Ok(EdgeType::ProvidesDev),
            "REQUIRES" => Ok(EdgeType::Requires),
            _ => Err(format!(
                "Invalid edge type: {}. Expected one of SOURCE, PROVIDES, PROVIDES_DEV, REQUIRES",
                s
            )),
        }
    }
}

/// Kind tag of a node: an edge type for components, a level for products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Component(EdgeType),
    Product(ProductLevel),
}

impl NodeKind {
    pub fn family(self) -> NodeFamily {
        match self {
            NodeKind::Component(_) => NodeFamily::Component,
            NodeKind::Product(_) => NodeFamily::Product,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Component(edge) => edge.as_str(),
            NodeKind::Product(level) => level.as_str(),
        }
    }

    /// Parses a stored kind tag back into the kind for the given family
    pub fn parse(family: NodeFamily, tag: &str) -> Option<Self> {
        match family {
            NodeFamily::Component => tag.parse().ok().map(NodeKind::Component),
            NodeFamily::Product => tag.parse().ok().map(NodeKind::Product),
        }
    }

    pub fn edge_type(self) -> Option<EdgeType> {
        match self {
            NodeKind::Component(edge) => Some(edge),
            NodeKind::Product(_) => None,
        }
    }

    pub fn level(self) -> Option<ProductLevel> {
        match self {
            NodeKind::Product(level) => Some(level),
            NodeKind::Component(_) => None,
        }
    }

    /// Payload kind a node of this kind is allowed to point to
    pub fn payload_kind(self) -> PayloadKind {
        match self {
            NodeKind::Component(_) => PayloadKind::Component,
            NodeKind::Product(level) => PayloadKind::from(level),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity kinds a node can point to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadKind {
    Component,
    Product,
    ProductVersion,
    ProductStream,
    ProductVariant,
    Channel,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Component => "COMPONENT",
            PayloadKind::Product => "PRODUCT",
            PayloadKind::ProductVersion => "PRODUCT_VERSION",
            PayloadKind::ProductStream => "PRODUCT_STREAM",
            PayloadKind::ProductVariant => "PRODUCT_VARIANT",
            PayloadKind::Channel => "CHANNEL",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "COMPONENT" => Some(PayloadKind::Component),
            "PRODUCT" => Some(PayloadKind::Product),
            "PRODUCT_VERSION" => Some(PayloadKind::ProductVersion),
            "PRODUCT_STREAM" => Some(PayloadKind::ProductStream),
            "PRODUCT_VARIANT" => Some(PayloadKind::ProductVariant),
            "CHANNEL" => Some(PayloadKind::Channel),
            _ => None,
        }
    }

    pub fn family(self) -> NodeFamily {
        match self {
            PayloadKind::Component => NodeFamily::Component,
            _ => NodeFamily::Product,
        }
    }
}

impl From<ProductLevel> for PayloadKind {
    fn from(level: ProductLevel) -> Self {
        match level {
            ProductLevel::Product => PayloadKind::Product,
            ProductLevel::ProductVersion => PayloadKind::ProductVersion,
            ProductLevel::ProductStream => PayloadKind::ProductStream,
            ProductLevel::ProductVariant => PayloadKind::ProductVariant,
            ProductLevel::Channel => PayloadKind::Channel,
        }
    }
}

/// Typed reference from a node to its payload row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PayloadRef {
    pub kind: PayloadKind,
    pub id: Uuid,
}

impl PayloadRef {
    pub fn new(kind: PayloadKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    /// Stable link string used by read models, e.g. `component/<uuid>`
    pub fn link(&self) -> String {
        format!("{}/{}", self.kind.as_str().to_lowercase(), self.id)
    }
}

/// Anything a node can point to.
///
/// The identity is the string cached on the node (purl for components,
/// name for product entities) and is checked on every attach.
pub trait NodePayload {
    fn payload_ref(&self) -> PayloadRef;
    fn node_identity(&self) -> &str;
}

/// A resolved payload record, looked up from a [`PayloadRef`]
#[derive(Debug, Clone)]
pub enum Payload {
    Component(Component),
    Product(ProductModel),
    ProductVersion(ProductModel),
    ProductStream(ProductModel),
    ProductVariant(ProductModel),
    Channel(Channel),
}

impl Payload {
    pub fn identity(&self) -> &str {
        match self {
            Payload::Component(component) => component.node_identity(),
            Payload::Product(model)
            | Payload::ProductVersion(model)
            | Payload::ProductStream(model)
            | Payload::ProductVariant(model) => model.node_identity(),
            Payload::Channel(channel) => channel.node_identity(),
        }
    }
}

/// One position in a tree.
///
/// The position encoding is a materialized parent chain (`/1/5/9/`). It is
/// private to the crate so the storage strategy can change without touching
/// callers, which only use ancestor/descendant queries and
/// [`Node::is_ancestor_of`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    parent_id: Option<NodeId>,
    depth: u32,
    identity: String,
    payload: PayloadRef,
    path: String,
}

impl Node {
    pub(crate) fn from_parts(
        id: NodeId,
        kind: NodeKind,
        parent_id: Option<NodeId>,
        depth: u32,
        identity: String,
        payload: PayloadRef,
        path: String,
    ) -> Self {
        Self {
            id,
            kind,
            parent_id,
            depth,
            identity,
            payload,
            path,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn family(&self) -> NodeFamily {
        self.kind.family()
    }

    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn payload(&self) -> PayloadRef {
        self.payload
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// O(1) ancestor test; a node is not its own ancestor
    pub fn is_ancestor_of(&self, other: &Node) -> bool {
        self.family() == other.family()
            && other.path.len() > self.path.len()
            && other.path.starts_with(&self.path)
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    /// Ids along the parent chain, root first, ending with this node
    pub(crate) fn chain_ids(&self) -> Vec<NodeId> {
        chain_ids(&self.path)
    }
}

pub(crate) fn chain_ids(path: &str) -> Vec<NodeId> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| segment.parse::<i64>().ok())
        .map(NodeId::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, parent: Option<i64>, path: &str) -> Node {
        Node::from_parts(
            NodeId::new(id),
            NodeKind::Component(EdgeType::Provides),
            parent.map(NodeId::new),
            (chain_ids(path).len() - 1) as u32,
            format!("pkg:generic/n{}", id),
            PayloadRef::new(PayloadKind::Component, Uuid::new_v4()),
            path.to_string(),
        )
    }

    #[test]
    fn test_is_ancestor_of() {
        let root = node(1, None, "/1/");
        let child = node(5, Some(1), "/1/5/");
        let grandchild = node(9, Some(5), "/1/5/9/");
        let unrelated = node(50, Some(1), "/1/50/");

        assert!(root.is_ancestor_of(&child));
        assert!(root.is_ancestor_of(&grandchild));
        assert!(child.is_ancestor_of(&grandchild));
        assert!(!child.is_ancestor_of(&unrelated));
        assert!(!child.is_ancestor_of(&child));
        assert!(!grandchild.is_ancestor_of(&root));
    }

    #[test]
    fn test_chain_ids_root_first() {
        let ids = chain_ids("/1/5/9/");
        assert_eq!(ids, vec![NodeId::new(1), NodeId::new(5), NodeId::new(9)]);
    }

    #[test]
    fn test_edge_type_round_trip_tags() {
        assert_eq!("provides_dev".parse::<EdgeType>().unwrap(), EdgeType::ProvidesDev);
        assert_eq!("PROVIDES-DEV".parse::<EdgeType>().unwrap(), EdgeType::ProvidesDev);
        assert!("BUNDLES".parse::<EdgeType>().is_err());
        assert!(EdgeType::ProvidesDev.is_provides());
        assert!(!EdgeType::Source.is_provides());
    }

    #[test]
    fn test_node_kind_parse_is_family_scoped() {
        assert_eq!(
            NodeKind::parse(NodeFamily::Component, "SOURCE"),
            Some(NodeKind::Component(EdgeType::Source))
        );
        assert_eq!(NodeKind::parse(NodeFamily::Component, "PRODUCT_STREAM"), None);
        assert_eq!(
            NodeKind::parse(NodeFamily::Product, "PRODUCT_STREAM"),
            Some(NodeKind::Product(ProductLevel::ProductStream))
        );
    }

    #[test]
    fn test_payload_kind_matches_level() {
        assert_eq!(
            NodeKind::Product(ProductLevel::Channel).payload_kind(),
            PayloadKind::Channel
        );
        assert_eq!(
            NodeKind::Component(EdgeType::Source).payload_kind(),
            PayloadKind::Component
        );
        assert_eq!(PayloadKind::ProductVariant.family(), NodeFamily::Product);
    }
}
