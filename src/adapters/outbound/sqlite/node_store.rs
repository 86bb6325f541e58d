use super::{conflict_or, conversion_error, parse_uuid, SqliteRegistry};
use crate::ports::outbound::NodeStore;
use crate::shared::error::RegistryError;
use crate::shared::Result;
use crate::taxonomy::domain::node::chain_ids;
use crate::taxonomy::domain::{
    Node, NodeFamily, NodeId, NodeKind, NodePayload, PayloadKind, PayloadRef,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

const NODE_COLUMNS: &str = "id, kind, parent_id, depth, identity, payload_kind, payload_id, path";

fn table(family: NodeFamily) -> &'static str {
    match family {
        NodeFamily::Component => "component_nodes",
        NodeFamily::Product => "product_nodes",
    }
}

/// Exclusive upper bound of the path range covering a subtree.
///
/// Paths end in `/` and `0` is the next byte after `/`, so every path that
/// starts with `/1/5/` sorts inside `["/1/5/", "/1/50")`.
fn subtree_upper_bound(path: &str) -> String {
    let mut upper = path[..path.len() - 1].to_string();
    upper.push('0');
    upper
}

fn map_node(family: NodeFamily, row: &Row<'_>) -> rusqlite::Result<Node> {
    let kind_tag: String = row.get(1)?;
    let kind = NodeKind::parse(family, &kind_tag)
        .ok_or_else(|| conversion_error(1, format!("unknown node kind '{}'", kind_tag)))?;
    let payload_tag: String = row.get(5)?;
    let payload_kind = PayloadKind::parse(&payload_tag)
        .ok_or_else(|| conversion_error(5, format!("unknown payload kind '{}'", payload_tag)))?;
    let payload_id: String = row.get(6)?;
    let depth: i64 = row.get(3)?;
    Ok(Node::from_parts(
        NodeId::new(row.get(0)?),
        kind,
        row.get::<_, Option<i64>>(2)?.map(NodeId::new),
        depth as u32,
        row.get(4)?,
        PayloadRef::new(payload_kind, parse_uuid(6, &payload_id)?),
        row.get(7)?,
    ))
}

fn load(conn: &Connection, family: NodeFamily, id: NodeId) -> rusqlite::Result<Option<Node>> {
    let sql = format!("SELECT {} FROM {} WHERE id = ?1", NODE_COLUMNS, table(family));
    conn.query_row(&sql, params![id.value()], |row| map_node(family, row))
        .optional()
}

fn load_existing(conn: &Connection, node: &Node) -> Result<Node> {
    load(conn, node.family(), node.id())?.ok_or_else(|| {
        RegistryError::NotFound {
            entity: "Node",
            key: node.id().to_string(),
            hint: "The node was deleted by a concurrent maintenance run".to_string(),
        }
        .into()
    })
}

fn query_nodes(
    conn: &Connection,
    family: NodeFamily,
    clause: &str,
    params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<Node>> {
    let sql = format!("SELECT {} FROM {} WHERE {}", NODE_COLUMNS, table(family), clause);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params, |row| map_node(family, row))?;
    rows.collect()
}

impl NodeStore for SqliteRegistry {
    fn create_or_get(
        &self,
        kind: NodeKind,
        parent: Option<&Node>,
        identity: &str,
        payload: &dyn NodePayload,
    ) -> Result<(Node, bool)> {
        if payload.node_identity() != identity {
            return Err(RegistryError::NodeIntegrity {
                expected: identity.to_string(),
                found: payload.node_identity().to_string(),
            }
            .into());
        }
        let payload_ref = payload.payload_ref();
        if payload_ref.kind != kind.payload_kind() {
            return Err(RegistryError::InvalidInput {
                message: format!(
                    "a {} node cannot point to a {} payload",
                    kind,
                    payload_ref.kind.as_str()
                ),
            }
            .into());
        }
        let family = kind.family();
        if let Some(parent) = parent {
            if parent.family() != family {
                return Err(RegistryError::InvalidInput {
                    message: format!("a {} node cannot be a child of a {} node", kind, parent.kind()),
                }
                .into());
            }
        }

        let table = table(family);
        let tx = self.immediate()?;

        // Re-read the parent; the caller's copy may predate a move
        let (parent_id, parent_path, depth) = match parent {
            Some(parent) => {
                let fresh = load(&tx, family, parent.id())?.ok_or_else(|| {
                    RegistryError::NotFound {
                        entity: "Parent node",
                        key: parent.id().to_string(),
                        hint: "The parent subtree was deleted while this tree was being built"
                            .to_string(),
                    }
                })?;
                (Some(fresh.id().value()), fresh.path().to_string(), fresh.depth() + 1)
            }
            None => (None, "/".to_string(), 0),
        };

        let inserted = tx.execute(
            &format!(
                "INSERT INTO {} (kind, parent_id, identity, payload_kind, payload_id, depth, path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, '')
                 ON CONFLICT DO NOTHING",
                table
            ),
            params![
                kind.as_str(),
                parent_id,
                identity,
                payload_ref.kind.as_str(),
                payload_ref.id.to_string(),
                depth
            ],
        )?;
        if inserted == 1 {
            let id = tx.last_insert_rowid();
            tx.execute(
                &format!("UPDATE {} SET path = ?1 WHERE id = ?2", table),
                params![format!("{}{}/", parent_path, id), id],
            )?;
        }

        let node = tx.query_row(
            &format!(
                "SELECT {} FROM {} WHERE kind = ?1 AND parent_id IS ?2 AND identity = ?3",
                NODE_COLUMNS, table
            ),
            params![kind.as_str(), parent_id, identity],
            |row| map_node(family, row),
        )?;
        tx.commit()?;

        if inserted == 1 {
            tracing::debug!(node_id = %node.id(), kind = %kind, identity, "created node");
        }
        Ok((node, inserted == 1))
    }

    fn get_node(&self, family: NodeFamily, id: NodeId) -> Result<Option<Node>> {
        Ok(load(self.conn(), family, id)?)
    }

    fn ancestors(&self, node: &Node, include_self: bool) -> Result<Vec<Node>> {
        let fresh = load_existing(self.conn(), node)?;
        let mut ids = fresh.chain_ids();
        if !include_self {
            ids.pop();
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let id_list = ids
            .iter()
            .map(|id| id.value().to_string())
            .collect::<Vec<_>>()
            .join(",");
        let mut nodes = query_nodes(
            self.conn(),
            fresh.family(),
            &format!("id IN ({}) ORDER BY depth", id_list),
            [],
        )?;
        nodes.sort_by_key(Node::depth);
        Ok(nodes)
    }

    fn descendants(&self, node: &Node, include_self: bool) -> Result<Vec<Node>> {
        let fresh = load_existing(self.conn(), node)?;
        let path = fresh.path().to_string();
        let upper = subtree_upper_bound(&path);
        let mut nodes = query_nodes(
            self.conn(),
            fresh.family(),
            "path >= ?1 AND path < ?2",
            params![path, upper],
        )?;
        if !include_self {
            nodes.retain(|n| n.id() != fresh.id());
        }
        Ok(nodes)
    }

    fn children(&self, node: &Node) -> Result<Vec<Node>> {
        Ok(query_nodes(
            self.conn(),
            node.family(),
            "parent_id = ?1 ORDER BY id",
            params![node.id().value()],
        )?)
    }

    fn root_of(&self, node: &Node) -> Result<Node> {
        let fresh = load_existing(self.conn(), node)?;
        let root_id = fresh.chain_ids().first().copied().unwrap_or(fresh.id());
        if root_id == fresh.id() {
            return Ok(fresh);
        }
        load(self.conn(), fresh.family(), root_id)?.ok_or_else(|| {
            RegistryError::NotFound {
                entity: "Root node",
                key: root_id.to_string(),
                hint: "The root was deleted by a concurrent maintenance run".to_string(),
            }
            .into()
        })
    }

    fn nodes_for_payload(&self, payload: PayloadRef) -> Result<Vec<Node>> {
        Ok(query_nodes(
            self.conn(),
            payload.kind.family(),
            "payload_kind = ?1 AND payload_id = ?2 ORDER BY id",
            params![payload.kind.as_str(), payload.id.to_string()],
        )?)
    }

    fn move_node(&self, node: &Node, new_parent: &Node) -> Result<Node> {
        if node.family() != new_parent.family() {
            return Err(RegistryError::InvalidMove {
                node_id: node.id().value(),
                reason: "the new parent belongs to the other tree".to_string(),
            }
            .into());
        }
        let family = node.family();
        let table = table(family);
        let tx = self.immediate()?;

        let node = load_existing(&tx, node)?;
        let new_parent = load_existing(&tx, new_parent)?;
        if new_parent.path().starts_with(node.path()) {
            return Err(RegistryError::InvalidMove {
                node_id: node.id().value(),
                reason: format!("node {} is inside the moved subtree", new_parent.id()),
            }
            .into());
        }
        if node.parent_id() == Some(new_parent.id()) {
            return Ok(node);
        }

        tx.execute(
            &format!("UPDATE {} SET parent_id = ?1 WHERE id = ?2", table),
            params![new_parent.id().value(), node.id().value()],
        )
        .map_err(|e| conflict_or(e, node.kind().as_str(), node.identity()))?;

        let old_path = node.path().to_string();
        let new_path = format!("{}{}/", new_parent.path(), node.id());
        let delta = i64::from(new_parent.depth()) + 1 - i64::from(node.depth());
        let moved = tx.execute(
            &format!(
                "UPDATE {} SET path = ?1 || substr(path, ?2), depth = depth + ?3
                 WHERE path >= ?4 AND path < ?5",
                table
            ),
            params![
                new_path,
                old_path.len() as i64 + 1,
                delta,
                old_path,
                subtree_upper_bound(&old_path)
            ],
        )?;
        let moved_node = load_existing(&tx, &node)?;
        tx.commit()?;

        tracing::info!(
            node_id = %node.id(),
            new_parent = %new_parent.id(),
            moved,
            "moved subtree"
        );
        Ok(moved_node)
    }

    fn delete_subtree(&self, node: &Node) -> Result<usize> {
        let tx = self.immediate()?;
        let Some(fresh) = load(&tx, node.family(), node.id())? else {
            return Ok(0);
        };
        let path = fresh.path().to_string();
        let removed = tx.execute(
            &format!("DELETE FROM {} WHERE path >= ?1 AND path < ?2", table(node.family())),
            params![path, subtree_upper_bound(&path)],
        )?;
        tx.commit()?;
        tracing::info!(node_id = %node.id(), removed, "deleted subtree");
        Ok(removed)
    }

    fn attach_payload(&self, node: &Node, payload: &dyn NodePayload) -> Result<Node> {
        let payload_ref = payload.payload_ref();
        if payload_ref.kind != node.kind().payload_kind() {
            return Err(RegistryError::InvalidInput {
                message: format!(
                    "a {} node cannot point to a {} payload",
                    node.kind(),
                    payload_ref.kind.as_str()
                ),
            }
            .into());
        }
        let tx = self.immediate()?;
        let fresh = load_existing(&tx, node)?;
        if fresh.identity() != payload.node_identity() {
            return Err(RegistryError::NodeIntegrity {
                expected: fresh.identity().to_string(),
                found: payload.node_identity().to_string(),
            }
            .into());
        }
        tx.execute(
            &format!(
                "UPDATE {} SET payload_kind = ?1, payload_id = ?2 WHERE id = ?3",
                table(fresh.family())
            ),
            params![
                payload_ref.kind.as_str(),
                payload_ref.id.to_string(),
                fresh.id().value()
            ],
        )?;
        let updated = load_existing(&tx, &fresh)?;
        tx.commit()?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{registry, rpm};
    use super::*;
    use crate::ports::outbound::ComponentRepository;
    use crate::taxonomy::domain::{Component, EdgeType};

    fn component(registry: &SqliteRegistry, name: &str) -> Component {
        registry.upsert_component(&rpm(name, "1.0", "x86_64")).unwrap().0
    }

    fn provides(registry: &SqliteRegistry, parent: &Node, payload: &Component) -> Node {
        registry
            .create_or_get(
                NodeKind::Component(EdgeType::Provides),
                Some(parent),
                &payload.purl,
                payload,
            )
            .unwrap()
            .0
    }

    fn root(registry: &SqliteRegistry, payload: &Component) -> Node {
        registry
            .create_or_get(NodeKind::Component(EdgeType::Source), None, &payload.purl, payload)
            .unwrap()
            .0
    }

    #[test]
    fn test_create_or_get_is_idempotent() {
        let registry = registry();
        let foo = component(&registry, "foo");

        let (first, created) = registry
            .create_or_get(NodeKind::Component(EdgeType::Source), None, &foo.purl, &foo)
            .unwrap();
        assert!(created);
        let (second, created) = registry
            .create_or_get(NodeKind::Component(EdgeType::Source), None, &foo.purl, &foo)
            .unwrap();
        assert!(!created);
        assert_eq!(first.id(), second.id());
        assert!(first.is_root());
        assert_eq!(first.depth(), 0);
    }

    #[test]
    fn test_identity_mismatch_is_rejected() {
        let registry = registry();
        let foo = component(&registry, "foo");
        let err = registry
            .create_or_get(NodeKind::Component(EdgeType::Source), None, "pkg:rpm/other", &foo)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RegistryError>(),
            Some(RegistryError::NodeIntegrity { .. })
        ));
    }

    #[test]
    fn test_same_identity_under_different_parents() {
        let registry = registry();
        let a = component(&registry, "a");
        let b = component(&registry, "b");
        let shared = component(&registry, "shared");

        let root_a = root(&registry, &a);
        let root_b = root(&registry, &b);
        let under_a = provides(&registry, &root_a, &shared);
        let under_b = provides(&registry, &root_b, &shared);
        assert_ne!(under_a.id(), under_b.id());

        let positions = registry
            .nodes_for_payload(shared.payload_ref())
            .unwrap();
        assert_eq!(positions.len(), 2);
    }

    #[test]
    fn test_ancestors_and_descendants_are_consistent() {
        let registry = registry();
        let top = component(&registry, "top");
        let mid = component(&registry, "mid");
        let leaf = component(&registry, "leaf");
        let other = component(&registry, "other");

        let root_node = root(&registry, &top);
        let mid_node = provides(&registry, &root_node, &mid);
        let leaf_node = provides(&registry, &mid_node, &leaf);
        let other_node = provides(&registry, &root_node, &other);

        let ancestors = registry.ancestors(&leaf_node, false).unwrap();
        let ids: Vec<_> = ancestors.iter().map(Node::id).collect();
        assert_eq!(ids, vec![root_node.id(), mid_node.id()]);

        for ancestor in &ancestors {
            let below = registry.descendants(ancestor, false).unwrap();
            assert!(below.iter().any(|n| n.id() == leaf_node.id()));
            assert!(ancestor.is_ancestor_of(&leaf_node));
        }

        let all = registry.descendants(&root_node, true).unwrap();
        assert_eq!(all.len(), 4);
        let under_mid = registry.descendants(&mid_node, false).unwrap();
        assert_eq!(under_mid.len(), 1);
        assert!(!mid_node.is_ancestor_of(&other_node));

        assert_eq!(registry.root_of(&leaf_node).unwrap().id(), root_node.id());
        assert_eq!(registry.children(&root_node).unwrap().len(), 2);
    }

    #[test]
    fn test_descendant_range_does_not_leak_into_sibling_ids() {
        let registry = registry();
        let top = component(&registry, "top");
        let root_node = root(&registry, &top);

        // Create enough nodes that a sibling id shares a decimal prefix
        let mut children = Vec::new();
        for i in 0..12 {
            let payload = component(&registry, &format!("child{}", i));
            children.push(provides(&registry, &root_node, &payload));
        }
        let first = &children[0];
        let below = registry.descendants(first, false).unwrap();
        assert!(below.is_empty());
    }

    #[test]
    fn test_move_node_rewrites_subtree() {
        let registry = registry();
        let a = component(&registry, "a");
        let b = component(&registry, "b");
        let mid = component(&registry, "mid");
        let leaf = component(&registry, "leaf");

        let root_a = root(&registry, &a);
        let root_b = root(&registry, &b);
        let mid_node = provides(&registry, &root_a, &mid);
        let leaf_node = provides(&registry, &mid_node, &leaf);

        let moved = registry.move_node(&mid_node, &root_b).unwrap();
        assert_eq!(moved.parent_id(), Some(root_b.id()));

        let leaf_after = registry
            .get_node(NodeFamily::Component, leaf_node.id())
            .unwrap()
            .unwrap();
        assert_eq!(registry.root_of(&leaf_after).unwrap().id(), root_b.id());
        assert_eq!(leaf_after.depth(), 2);
        assert!(registry.descendants(&root_a, false).unwrap().is_empty());
        assert_eq!(registry.descendants(&root_b, false).unwrap().len(), 2);
    }

    #[test]
    fn test_move_under_own_subtree_is_rejected() {
        let registry = registry();
        let a = component(&registry, "a");
        let mid = component(&registry, "mid");
        let root_a = root(&registry, &a);
        let mid_node = provides(&registry, &root_a, &mid);

        let err = registry.move_node(&root_a, &mid_node).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RegistryError>(),
            Some(RegistryError::InvalidMove { .. })
        ));
    }

    #[test]
    fn test_move_onto_existing_key_is_a_conflict() {
        let registry = registry();
        let a = component(&registry, "a");
        let b = component(&registry, "b");
        let shared = component(&registry, "shared");
        let root_a = root(&registry, &a);
        let root_b = root(&registry, &b);
        let under_a = provides(&registry, &root_a, &shared);
        provides(&registry, &root_b, &shared);

        let err = registry.move_node(&under_a, &root_b).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RegistryError>(),
            Some(RegistryError::NodeConflict { .. })
        ));
    }

    #[test]
    fn test_delete_subtree_counts_rows() {
        let registry = registry();
        let a = component(&registry, "a");
        let mid = component(&registry, "mid");
        let leaf = component(&registry, "leaf");
        let root_a = root(&registry, &a);
        let mid_node = provides(&registry, &root_a, &mid);
        provides(&registry, &mid_node, &leaf);

        assert_eq!(registry.delete_subtree(&mid_node).unwrap(), 2);
        assert_eq!(registry.descendants(&root_a, true).unwrap().len(), 1);
        assert_eq!(registry.delete_subtree(&mid_node).unwrap(), 0);
    }

    #[test]
    fn test_attach_payload_checks_identity() {
        let registry = registry();
        let a = component(&registry, "a");
        let b = component(&registry, "b");
        let node = root(&registry, &a);

        let err = registry.attach_payload(&node, &b).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RegistryError>(),
            Some(RegistryError::NodeIntegrity { .. })
        ));
        assert!(registry.attach_payload(&node, &a).is_ok());
    }
}
