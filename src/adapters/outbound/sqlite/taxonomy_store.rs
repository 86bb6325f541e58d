use super::{conversion_error, parse_uuid, SqliteRegistry};
use crate::ports::outbound::TaxonomyRepository;
use crate::shared::Result;
use crate::taxonomy::domain::{ComponentLinks, LinkKind, ProductFamily, ProductLevel};
use rusqlite::params;
use uuid::Uuid;

impl TaxonomyRepository for SqliteRegistry {
    fn add_product_links(&self, components: &[Uuid], family: &ProductFamily) -> Result<usize> {
        if components.is_empty() || family.is_empty() {
            return Ok(0);
        }
        let tx = self.immediate()?;
        let mut added = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO component_product_links (component_uuid, level, entity_uuid)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT DO NOTHING",
            )?;
            for component in components {
                let component = component.to_string();
                for (level, entity) in family.iter() {
                    added += stmt.execute(params![component, level.as_str(), entity.to_string()])?;
                }
            }
        }
        tx.commit()?;
        Ok(added)
    }

    fn remove_product_links(&self, components: &[Uuid], family: &ProductFamily) -> Result<usize> {
        if components.is_empty() || family.is_empty() {
            return Ok(0);
        }
        let tx = self.immediate()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare(
                "DELETE FROM component_product_links
                 WHERE component_uuid = ?1 AND level = ?2 AND entity_uuid = ?3",
            )?;
            for component in components {
                let component = component.to_string();
                for (level, entity) in family.iter() {
                    removed += stmt.execute(params![component, level.as_str(), entity.to_string()])?;
                }
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    fn product_links(&self, component: Uuid) -> Result<ProductFamily> {
        let mut stmt = self.conn().prepare(
            "SELECT level, entity_uuid FROM component_product_links WHERE component_uuid = ?1",
        )?;
        let rows = stmt.query_map(params![component.to_string()], |row| {
            let level: String = row.get(0)?;
            let entity: String = row.get(1)?;
            Ok((
                level
                    .parse::<ProductLevel>()
                    .map_err(|e| conversion_error(0, e))?,
                parse_uuid(1, &entity)?,
            ))
        })?;
        let mut family = ProductFamily::new();
        for row in rows {
            let (level, entity) = row?;
            family.insert(level, entity);
        }
        Ok(family)
    }

    fn components_linked_to(&self, level: ProductLevel, entity: Uuid) -> Result<Vec<Uuid>> {
        let mut stmt = self.conn().prepare(
            "SELECT component_uuid FROM component_product_links
             WHERE level = ?1 AND entity_uuid = ?2 ORDER BY component_uuid",
        )?;
        let rows = stmt.query_map(params![level.as_str(), entity.to_string()], |row| {
            let raw: String = row.get(0)?;
            parse_uuid(0, &raw)
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn count_linked(&self, components: &[Uuid], level: ProductLevel) -> Result<usize> {
        let mut stmt = self.conn().prepare(
            "SELECT EXISTS (SELECT 1 FROM component_product_links
                            WHERE component_uuid = ?1 AND level = ?2)",
        )?;
        let mut linked = 0;
        for component in components {
            let exists: bool =
                stmt.query_row(params![component.to_string(), level.as_str()], |row| row.get(0))?;
            if exists {
                linked += 1;
            }
        }
        Ok(linked)
    }

    fn replace_component_links(&self, component: Uuid, links: &ComponentLinks) -> Result<()> {
        let component = component.to_string();
        let tx = self.immediate()?;
        tx.execute(
            "DELETE FROM component_links WHERE component_uuid = ?1",
            params![component],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO component_links (component_uuid, link_kind, target_uuid)
                 VALUES (?1, ?2, ?3)",
            )?;
            for kind in LinkKind::ALL {
                for target in links.get(kind) {
                    stmt.execute(params![component, kind.as_str(), target.to_string()])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn component_links(&self, component: Uuid) -> Result<ComponentLinks> {
        let mut stmt = self.conn().prepare(
            "SELECT link_kind, target_uuid FROM component_links WHERE component_uuid = ?1",
        )?;
        let rows = stmt.query_map(params![component.to_string()], |row| {
            let kind: String = row.get(0)?;
            let target: String = row.get(1)?;
            Ok((
                LinkKind::parse(&kind)
                    .ok_or_else(|| conversion_error(0, format!("unknown link kind '{}'", kind)))?,
                parse_uuid(1, &target)?,
            ))
        })?;
        let mut links = ComponentLinks::default();
        for row in rows {
            let (kind, target) = row?;
            links.get_mut(kind).insert(target);
        }
        Ok(links)
    }
}
