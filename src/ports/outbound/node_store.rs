use crate::shared::Result;
use crate::taxonomy::domain::{Node, NodeFamily, NodeId, NodeKind, NodePayload, PayloadRef};

/// NodeStore port - the generic tree engine behind both forests
///
/// Callers only see ancestor/descendant/children queries. How positions are
/// encoded is an implementation detail of the adapter.
///
/// Every node is unique on (kind, parent, identity). `create_or_get` must
/// resolve concurrent inserts of the same key through the storage layer's
/// conflict handling, never through a check-then-insert.
pub trait NodeStore {
    /// Inserts a node or returns the one already stored for the same key.
    ///
    /// # Arguments
    /// * `kind` - Edge type (components) or level (products)
    /// * `parent` - Parent node, `None` for a forest root
    /// * `identity` - Cached identity string; must equal the payload's identity
    /// * `payload` - Entity the node points to
    ///
    /// # Returns
    /// The stored node and whether this call created it. An existing node
    /// keeps its original payload linkage.
    ///
    /// # Errors
    /// Returns `RegistryError::NodeIntegrity` when `identity` does not match
    /// the payload, and `RegistryError::InvalidInput` when the kind, parent
    /// and payload belong to different families.
    fn create_or_get(
        &self,
        kind: NodeKind,
        parent: Option<&Node>,
        identity: &str,
        payload: &dyn NodePayload,
    ) -> Result<(Node, bool)>;

    fn get_node(&self, family: NodeFamily, id: NodeId) -> Result<Option<Node>>;

    /// Ancestors ordered root-first
    fn ancestors(&self, node: &Node, include_self: bool) -> Result<Vec<Node>>;

    /// Every node below `node`, in no particular order
    fn descendants(&self, node: &Node, include_self: bool) -> Result<Vec<Node>>;

    fn children(&self, node: &Node) -> Result<Vec<Node>>;

    fn root_of(&self, node: &Node) -> Result<Node>;

    /// All tree positions of one entity
    fn nodes_for_payload(&self, payload: PayloadRef) -> Result<Vec<Node>>;

    /// Re-parents a node together with its subtree.
    ///
    /// # Errors
    /// `RegistryError::InvalidMove` for a move below the node itself or across
    /// families, `RegistryError::NodeConflict` when the new parent already holds
    /// a node with the same kind and identity.
    fn move_node(&self, node: &Node, new_parent: &Node) -> Result<Node>;

    /// Deletes a node and everything below it, returning the removed count
    fn delete_subtree(&self, node: &Node) -> Result<usize>;

    /// Points an existing node at a (re-created) payload row.
    ///
    /// # Errors
    /// `RegistryError::NodeIntegrity` when the payload identity differs from
    /// the identity cached on the node.
    fn attach_payload(&self, node: &Node, payload: &dyn NodePayload) -> Result<Node>;
}
