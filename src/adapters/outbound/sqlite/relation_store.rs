use super::{conversion_error, meta_to_sql, parse_meta, parse_uuid, SqliteRegistry};
use crate::ports::outbound::RelationRepository;
use crate::shared::Result;
use crate::taxonomy::domain::{
    BuildKey, BuildType, NewRelation, ProductComponentRelation, RelationType, SoftwareBuild,
};
use rusqlite::{params, Row};
use uuid::Uuid;

const RELATION_COLUMNS: &str =
    "uuid, type, external_system_id, product_ref, build_id, build_type, software_build, meta_attr";

fn map_relation(row: &Row<'_>) -> rusqlite::Result<ProductComponentRelation> {
    let uuid: String = row.get(0)?;
    let relation_type: String = row.get(1)?;
    let meta: String = row.get(7)?;
    Ok(ProductComponentRelation {
        uuid: parse_uuid(0, &uuid)?,
        relation_type: relation_type
            .parse::<RelationType>()
            .map_err(|e| conversion_error(1, e))?,
        external_system_id: row.get(2)?,
        product_ref: row.get(3)?,
        build_id: row.get(4)?,
        build_type: row.get(5)?,
        software_build: row.get(6)?,
        meta_attr: parse_meta(7, &meta)?,
    })
}

impl RelationRepository for SqliteRegistry {
    fn add_relation(&self, relation: &NewRelation) -> Result<bool> {
        let inserted = self.conn().execute(
            &format!(
                "INSERT INTO product_component_relations ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6,
                         (SELECT id FROM software_builds WHERE build_id = ?5 AND build_type = ?6),
                         ?7)
                 ON CONFLICT (external_system_id, product_ref, build_id, build_type) DO NOTHING",
                RELATION_COLUMNS
            ),
            params![
                Uuid::new_v4().to_string(),
                relation.relation_type.as_str(),
                relation.external_system_id,
                relation.product_ref,
                relation.build_id,
                relation.build_type.to_uppercase(),
                meta_to_sql(&relation.meta_attr)?
            ],
        )?;
        Ok(inserted == 1)
    }

    fn relations_for_build(&self, key: &BuildKey) -> Result<Vec<ProductComponentRelation>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {} FROM product_component_relations
             WHERE build_id = ?1 AND build_type = ?2
             ORDER BY type, product_ref, external_system_id",
            RELATION_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![key.build_id, key.build_type.as_str()],
            map_relation,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn builds_for_product_ref(&self, product_ref: &str) -> Result<Vec<BuildKey>> {
        let mut stmt = self.conn().prepare(
            "SELECT DISTINCT build_id, build_type FROM product_component_relations
             WHERE product_ref = ?1 ORDER BY build_type, build_id",
        )?;
        let rows = stmt.query_map(params![product_ref], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut keys = Vec::new();
        for row in rows {
            let (build_id, build_type) = row?;
            match build_type.parse::<BuildType>() {
                Ok(build_type) => keys.push(BuildKey::new(build_id, build_type)),
                Err(_) => {
                    tracing::debug!(build_id, build_type, "skipping evidence for unsupported build type")
                }
            }
        }
        Ok(keys)
    }

    fn link_relations_to_build(&self, build: &SoftwareBuild) -> Result<usize> {
        Ok(self.conn().execute(
            "UPDATE product_component_relations SET software_build = ?1
             WHERE build_id = ?2 AND build_type = ?3 AND software_build IS NOT ?1",
            params![build.id, build.key.build_id, build.key.build_type.as_str()],
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::registry;
    use super::*;
    use crate::ports::outbound::ComponentRepository;
    use crate::taxonomy::domain::SoftwareBuildDraft;
    use serde_json::Map;

    fn relation(product_ref: &str, build_id: &str) -> NewRelation {
        NewRelation {
            relation_type: RelationType::Errata,
            external_system_id: "RHBA-2023:0001".to_string(),
            product_ref: product_ref.to_string(),
            build_id: build_id.to_string(),
            build_type: "BREW".to_string(),
            meta_attr: Map::new(),
        }
    }

    #[test]
    fn test_duplicate_evidence_is_a_no_op() {
        let registry = registry();
        assert!(registry.add_relation(&relation("V1", "1")).unwrap());
        assert!(!registry.add_relation(&relation("V1", "1")).unwrap());

        let rows = registry
            .relations_for_build(&BuildKey::new("1", BuildType::Brew))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].software_build, None);
    }

    #[test]
    fn test_link_relations_to_build() {
        let registry = registry();
        registry.add_relation(&relation("V1", "1")).unwrap();
        let (build, _) = registry
            .save_build(&SoftwareBuildDraft {
                key: BuildKey::new("1", BuildType::Brew),
                name: "foo".to_string(),
                source: String::new(),
                completion_time: None,
                meta_attr: Map::new(),
            })
            .unwrap();

        assert_eq!(registry.link_relations_to_build(&build).unwrap(), 1);
        assert_eq!(registry.link_relations_to_build(&build).unwrap(), 0);
        let rows = registry.relations_for_build(&build.key).unwrap();
        assert_eq!(rows[0].software_build, Some(build.id));
    }

    #[test]
    fn test_builds_for_product_ref_skips_unknown_build_types() {
        let registry = registry();
        registry.add_relation(&relation("V1", "1")).unwrap();
        let mut pnc = relation("V1", "2");
        pnc.build_type = "PNC".to_string();
        registry.add_relation(&pnc).unwrap();

        let keys = registry.builds_for_product_ref("V1").unwrap();
        assert_eq!(keys, vec![BuildKey::new("1", BuildType::Brew)]);
    }
}
