use crate::ports::outbound::RegistryStore;
use crate::shared::Result;
use crate::taxonomy::domain::{
    BuildKey, BuildType, NewRelation, ProductLevel, RelationType, TagBuilds,
};
use serde_json::{json, Map};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationLoadReport {
    pub created: usize,
    pub existing: usize,
    /// Builds with new evidence, in key order; these need materializing
    pub builds: Vec<BuildKey>,
}

/// RelationLoader service upserting build-to-product evidence
pub struct RelationLoader<'a, S: RegistryStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RegistryStore + ?Sized> RelationLoader<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn load(&self, relations: &[NewRelation]) -> Result<RelationLoadReport> {
        let mut report = RelationLoadReport::default();
        let mut builds = BTreeSet::new();
        for relation in relations {
            if self.store.add_relation(relation)? {
                report.created += 1;
                match relation.build_type.parse::<BuildType>() {
                    Ok(build_type) => {
                        builds.insert(BuildKey::new(relation.build_id.clone(), build_type));
                    }
                    Err(_) => tracing::warn!(
                        build_id = %relation.build_id,
                        build_type = %relation.build_type,
                        "evidence for an unsupported build type will never be materialized"
                    ),
                }
            } else {
                report.existing += 1;
            }
        }
        report.builds = builds.into_iter().collect();
        tracing::info!(created = report.created, existing = report.existing, "loaded product evidence");
        Ok(report)
    }

    /// BREW_TAG evidence for every build tagged into a stream's brew tags.
    ///
    /// Tags not claimed by any stream are ignored.
    pub fn derive_brew_tag_relations(&self, tag_builds: &TagBuilds) -> Result<Vec<NewRelation>> {
        let mut relations = Vec::new();
        for stream in self.store.list_product_models(ProductLevel::ProductStream)? {
            let Some(details) = &stream.stream else {
                continue;
            };
            for (tag, inherit) in &details.brew_tags {
                let Some(build_ids) = tag_builds.get(tag) else {
                    continue;
                };
                let mut meta_attr = Map::new();
                meta_attr.insert("inherit".to_string(), json!(inherit));
                relations.extend(build_ids.iter().map(|build_id| NewRelation {
                    relation_type: RelationType::BrewTag,
                    external_system_id: tag.clone(),
                    product_ref: stream.name.clone(),
                    build_id: build_id.clone(),
                    build_type: BuildType::Brew.as_str().to_string(),
                    meta_attr: meta_attr.clone(),
                }));
            }
        }
        tracing::debug!(relations = relations.len(), "derived brew tag evidence");
        Ok(relations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::sqlite::test_support::{model, registry};
    use crate::ports::outbound::{ProductRepository, RelationRepository};
    use crate::taxonomy::domain::StreamDetails;
    use std::collections::BTreeMap;

    fn errata(build_id: &str, build_type: &str) -> NewRelation {
        NewRelation {
            relation_type: RelationType::Errata,
            external_system_id: "RHBA-2024:0001".to_string(),
            product_ref: "AppStream-8.6.0.Z.MAIN".to_string(),
            build_id: build_id.to_string(),
            build_type: build_type.to_string(),
            meta_attr: Map::new(),
        }
    }

    #[test]
    fn test_load_counts_created_and_existing() {
        let store = registry();
        let loader = RelationLoader::new(&store);
        let report = loader
            .load(&[errata("1", "BREW"), errata("2", "BREW"), errata("3", "PNC")])
            .unwrap();
        assert_eq!(report.created, 3);
        assert_eq!(
            report.builds,
            vec![BuildKey::new("1", BuildType::Brew), BuildKey::new("2", BuildType::Brew)]
        );

        let again = loader.load(&[errata("1", "BREW")]).unwrap();
        assert_eq!(again.created, 0);
        assert_eq!(again.existing, 1);
        assert!(again.builds.is_empty());
    }

    #[test]
    fn test_brew_tag_relations_follow_stream_tags() {
        let store = registry();
        let mut stream = model(ProductLevel::ProductStream, "rhel-8.6.0");
        stream.stream = Some(StreamDetails {
            active: true,
            brew_tags: BTreeMap::from([("rhel-8.6.0-candidate".to_string(), true)]),
            ..Default::default()
        });
        store.save_product_model(&stream).unwrap();

        let tag_builds: TagBuilds = BTreeMap::from([
            ("rhel-8.6.0-candidate".to_string(), vec!["10".to_string(), "11".to_string()]),
            ("unclaimed-tag".to_string(), vec!["12".to_string()]),
        ]);
        let loader = RelationLoader::new(&store);
        let relations = loader.derive_brew_tag_relations(&tag_builds).unwrap();
        assert_eq!(relations.len(), 2);
        assert!(relations
            .iter()
            .all(|r| r.product_ref == "rhel-8.6.0" && r.relation_type == RelationType::BrewTag));

        loader.load(&relations).unwrap();
        let stored = store
            .relations_for_build(&BuildKey::new("10", BuildType::Brew))
            .unwrap();
        assert_eq!(stored[0].external_system_id, "rhel-8.6.0-candidate");
    }
}
