use crate::ports::outbound::RegistryStore;
use crate::shared::error::RegistryError;
use crate::shared::Result;
use crate::taxonomy::domain::{
    BuildKey, Channel, ChannelDraft, ChannelRecord, Lineage, Node, NodeFamily, NodeId, NodeKind,
    NodePayload, Ofuri, ProductDefinitions, ProductFamily, ProductLevel, ProductModel,
    ProductModelDraft, StreamDetails, StreamRecord, VariantRecord,
};
use crate::taxonomy::services::TaxonomyMaterializer;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// A variant that moved to a different stream during a load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reparenting {
    pub variant: String,
    pub from_stream: Option<Uuid>,
    pub to_stream: String,
    /// Builds whose product links went stale with the move
    pub builds: Vec<BuildKey>,
    pub links_removed: usize,
}

/// A variant node dropped because its stream no longer lists the variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detachment {
    pub variant: String,
    pub from_stream: String,
    pub builds: Vec<BuildKey>,
    pub links_removed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ProductLoadReport {
    pub models_created: usize,
    pub channels_created: usize,
    pub nodes_created: usize,
    pub reparented: Vec<Reparenting>,
    pub detached: Vec<Detachment>,
}

impl ProductLoadReport {
    /// Distinct builds to re-materialize because the tree changed shape
    pub fn builds_to_rematerialize(&self) -> Vec<BuildKey> {
        self.reparented
            .iter()
            .flat_map(|moved| moved.builds.iter())
            .chain(self.detached.iter().flat_map(|dropped| dropped.builds.iter()))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// ProductTreeBuilder service for the product → version → stream → variant tree
///
/// Loading is an upsert: entities are matched by name, and nodes by
/// (level, parent, name). Channels hang below every variant that lists them.
/// A stream in the document owns exactly the variants it lists; variant
/// nodes it no longer lists are removed along with the links they fed.
pub struct ProductTreeBuilder<'a, S: RegistryStore + ?Sized> {
    store: &'a S,
}

/// Per-load state.
///
/// `placed_variants` is the stream each variant was first placed under in
/// this run. `listed` holds every stream node the document names with the
/// variants it lists. `stale` is the pre-move family behind each entry of
/// `report.reparented`.
struct LoadState {
    report: ProductLoadReport,
    placed_variants: HashMap<String, Uuid>,
    listed: HashMap<NodeId, (Node, BTreeSet<Uuid>)>,
    stale: Vec<ProductFamily>,
}

impl<'a, S: RegistryStore + ?Sized> ProductTreeBuilder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn load(&self, definitions: &ProductDefinitions) -> Result<ProductLoadReport> {
        let mut state = LoadState {
            report: ProductLoadReport::default(),
            placed_variants: HashMap::new(),
            listed: HashMap::new(),
            stale: Vec::new(),
        };

        for product in &definitions.products {
            let mut draft = ProductModelDraft::new(ProductLevel::Product, &product.name);
            draft.description = product.description.clone();
            draft.ofuri = Ofuri::product(&product.name);
            draft.meta_attr = product.meta_attr.clone();
            let (product_model, product_node) = self.save_model(&draft, None, &mut state)?;

            for version in &product.versions {
                let mut draft = ProductModelDraft::new(ProductLevel::ProductVersion, &version.name);
                draft.description = version.description.clone();
                draft.version = Ofuri::version_part(&version.name, &version.version);
                draft.ofuri = Ofuri::version(&product.name, &version.name, &version.version);
                draft.lineage.product = Some(product_model.uuid);
                draft.meta_attr = version.meta_attr.clone();
                let (version_model, version_node) =
                    self.save_model(&draft, Some(&product_node), &mut state)?;

                for stream in &version.streams {
                    let lineage = Lineage {
                        product: Some(product_model.uuid),
                        product_version: Some(version_model.uuid),
                        product_stream: None,
                    };
                    self.load_stream(&product.name, stream, lineage, &version_node, &mut state)?;
                }
            }
        }

        self.prune_unlisted_variants(&mut state)?;

        // Re-derive once the whole document is in place, so the follow-up
        // materialization reads the final tree.
        let materializer = TaxonomyMaterializer::new(self.store);
        let mut report = state.report;
        for (moved, stale) in report.reparented.iter_mut().zip(&state.stale) {
            moved.links_removed = materializer.rederive(&moved.builds, stale)?;
        }

        tracing::info!(
            models_created = report.models_created,
            channels_created = report.channels_created,
            nodes_created = report.nodes_created,
            reparented = report.reparented.len(),
            detached = report.detached.len(),
            "loaded product definitions"
        );
        Ok(report)
    }

    fn load_stream(
        &self,
        product_name: &str,
        stream: &StreamRecord,
        lineage: Lineage,
        version_node: &Node,
        state: &mut LoadState,
    ) -> Result<()> {
        let mut draft = ProductModelDraft::new(ProductLevel::ProductStream, &stream.name);
        draft.description = stream.description.clone();
        draft.version = Ofuri::version_part(&stream.name, &stream.version);
        draft.ofuri = Ofuri::stream(product_name, &stream.name, &stream.version);
        draft.cpe = stream.cpe.clone();
        draft.lineage = lineage.clone();
        draft.stream = Some(StreamDetails {
            active: stream.active,
            brew_tags: stream.brew_tags.clone(),
            yum_repositories: stream.yum_repositories.clone(),
            composes: stream.composes.clone(),
        });
        draft.meta_attr = stream.meta_attr.clone();
        let (stream_model, stream_node) = self.save_model(&draft, Some(version_node), state)?;
        state
            .listed
            .entry(stream_node.id())
            .or_insert_with(|| (stream_node.clone(), BTreeSet::new()));

        let variant_lineage = Lineage {
            product_stream: Some(stream_model.uuid),
            ..lineage
        };
        for variant in &stream.variants {
            let variant_uuid =
                self.load_variant(variant, &stream_model, &stream_node, variant_lineage.clone(), state)?;
            if let Some((_, listed)) = state.listed.get_mut(&stream_node.id()) {
                listed.insert(variant_uuid);
            }
        }
        Ok(())
    }

    fn load_variant(
        &self,
        variant: &VariantRecord,
        stream: &ProductModel,
        stream_node: &Node,
        lineage: Lineage,
        state: &mut LoadState,
    ) -> Result<Uuid> {
        let mut draft = ProductModelDraft::new(ProductLevel::ProductVariant, &variant.name);
        draft.description = variant.description.clone();
        draft.ofuri = Ofuri::variant(Some(&stream.ofuri), &variant.name);
        draft.cpe = variant.cpe.clone();
        draft.lineage = lineage;
        draft.meta_attr = variant.meta_attr.clone();

        let (variant_uuid, variant_node) = match state.placed_variants.get(&variant.name).copied() {
            // Listed under several streams in one document: keep the first
            // stream as the owner and give the variant one node per stream.
            Some(first_stream) if first_stream != stream.uuid => {
                let model = self
                    .store
                    .find_product_model(ProductLevel::ProductVariant, &variant.name)?
                    .ok_or_else(|| RegistryError::NotFound {
                        entity: "ProductVariant",
                        key: variant.name.clone(),
                        hint: "The variant was saved earlier in this load".to_string(),
                    })?;
                let node = self.place(ProductLevel::ProductVariant, Some(stream_node), &model, state)?;
                (model.uuid, node)
            }
            _ => {
                let previous = self
                    .store
                    .find_product_model(ProductLevel::ProductVariant, &variant.name)?;
                let moved_from = previous
                    .as_ref()
                    .and_then(|model| model.lineage.product_stream)
                    .filter(|old_stream| *old_stream != stream.uuid);

                let (model, created) = self.store.save_product_model(&draft)?;
                if created {
                    state.report.models_created += 1;
                }
                if let Some(old_stream) = moved_from {
                    let (moved, stale) = self.reparent(&model, old_stream, stream, stream_node)?;
                    state.report.reparented.push(moved);
                    state.stale.push(stale);
                }
                state.placed_variants.insert(variant.name.clone(), stream.uuid);
                let node = self.place(ProductLevel::ProductVariant, Some(stream_node), &model, state)?;
                (model.uuid, node)
            }
        };

        for channel in &variant.channels {
            self.load_channel(channel, &variant_node, state)?;
        }
        Ok(variant_uuid)
    }

    /// Moves a variant's tree position under its new stream.
    ///
    /// Its foreign keys were already rewritten by the save. Returns the
    /// builds that relied on the old position together with the old
    /// stream's family, captured before anything moved.
    fn reparent(
        &self,
        variant: &ProductModel,
        old_stream: Uuid,
        new_stream: &ProductModel,
        new_stream_node: &Node,
    ) -> Result<(Reparenting, ProductFamily)> {
        let mut stale_family = ProductFamily::new();
        let mut builds: BTreeSet<BuildKey> =
            self.store.builds_for_product_ref(&variant.name)?.into_iter().collect();
        if let Some(old_model) = self
            .store
            .get_product_model(ProductLevel::ProductStream, old_stream)?
        {
            for stream_node in self.store.nodes_for_payload(old_model.payload_ref())? {
                stale_family.union_with(&self.stream_family(&stream_node)?);
            }
            builds.extend(self.store.builds_for_product_ref(&old_model.name)?);
        }

        let nodes = self.store.nodes_for_payload(variant.payload_ref())?;
        let mut target_held = nodes
            .iter()
            .any(|node| node.parent_id() == Some(new_stream_node.id()));

        for stale in nodes
            .iter()
            .filter(|node| node.parent_id() != Some(new_stream_node.id()))
        {
            if stale.is_ancestor_of(new_stream_node) {
                continue;
            }
            if target_held {
                let removed = self.store.delete_subtree(stale)?;
                tracing::debug!(variant = %variant.name, node_id = %stale.id(), removed, "removed stale variant subtree");
                continue;
            }
            match self.store.move_node(stale, new_stream_node) {
                Ok(_) => target_held = true,
                Err(err)
                    if matches!(
                        err.downcast_ref::<RegistryError>(),
                        Some(RegistryError::NodeConflict { .. })
                    ) =>
                {
                    self.store.delete_subtree(stale)?;
                    target_held = true;
                }
                Err(err) => return Err(err),
            }
        }

        tracing::info!(
            variant = %variant.name,
            from_stream = %old_stream,
            to_stream = %new_stream.name,
            builds = builds.len(),
            "re-parented variant"
        );

        let moved = Reparenting {
            variant: variant.name.clone(),
            from_stream: Some(old_stream),
            to_stream: new_stream.name.clone(),
            builds: builds.into_iter().collect(),
            links_removed: 0,
        };
        Ok((moved, stale_family))
    }

    /// Drops variant nodes under a loaded stream that the document no longer
    /// lists there, then re-derives the links of the builds they fed.
    fn prune_unlisted_variants(&self, state: &mut LoadState) -> Result<()> {
        let materializer = TaxonomyMaterializer::new(self.store);
        let listed = std::mem::take(&mut state.listed);
        for (stream_node, variants) in listed.into_values() {
            let unlisted: Vec<Node> = self
                .store
                .children(&stream_node)?
                .into_iter()
                .filter(|child| child.kind().level() == Some(ProductLevel::ProductVariant))
                .filter(|child| !variants.contains(&child.payload().id))
                .collect();
            if unlisted.is_empty() {
                continue;
            }

            let stale_family = self.stream_family(&stream_node)?;
            for node in unlisted {
                let removed = self.store.delete_subtree(&node)?;
                let mut builds: BTreeSet<BuildKey> = self
                    .store
                    .builds_for_product_ref(node.identity())?
                    .into_iter()
                    .collect();
                builds.extend(self.store.builds_for_product_ref(stream_node.identity())?);
                let builds: Vec<BuildKey> = builds.into_iter().collect();
                tracing::info!(
                    variant = %node.identity(),
                    stream = %stream_node.identity(),
                    nodes_removed = removed,
                    builds = builds.len(),
                    "detached unlisted variant"
                );
                state.report.detached.push(Detachment {
                    variant: node.identity().to_string(),
                    from_stream: stream_node.identity().to_string(),
                    links_removed: materializer.rederive(&builds, &stale_family)?,
                    builds,
                });
            }
        }
        Ok(())
    }

    fn stream_family(&self, stream_node: &Node) -> Result<ProductFamily> {
        let mut family = ProductFamily::new();
        family.extend_from_nodes(&self.store.ancestors(stream_node, true)?);
        family.extend_from_nodes(&self.store.descendants(stream_node, true)?);
        Ok(family)
    }

    fn load_channel(&self, record: &ChannelRecord, variant_node: &Node, state: &mut LoadState) -> Result<Channel> {
        let (channel, created) = self.store.save_channel(&ChannelDraft {
            name: record.name.clone(),
            channel_type: record.channel_type,
            relative_url: record.relative_url.clone(),
            description: record.description.clone(),
            meta_attr: Default::default(),
        })?;
        if created {
            state.report.channels_created += 1;
        }
        self.place(ProductLevel::Channel, Some(variant_node), &channel, state)?;
        Ok(channel)
    }

    fn save_model(
        &self,
        draft: &ProductModelDraft,
        parent: Option<&Node>,
        state: &mut LoadState,
    ) -> Result<(ProductModel, Node)> {
        let (model, created) = self.store.save_product_model(draft)?;
        if created {
            state.report.models_created += 1;
        }
        let node = self.place(draft.level, parent, &model, state)?;
        Ok((model, node))
    }

    fn place(
        &self,
        level: ProductLevel,
        parent: Option<&Node>,
        payload: &dyn NodePayload,
        state: &mut LoadState,
    ) -> Result<Node> {
        let (node, created) = self.store.create_or_get(
            NodeKind::Product(level),
            parent,
            payload.node_identity(),
            payload,
        )?;
        if created {
            state.report.nodes_created += 1;
        }
        debug_assert_eq!(node.family(), NodeFamily::Product);
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::sqlite::test_support::registry;
    use crate::ports::outbound::{
        ComponentRepository, NodeStore, ProductRepository, RelationRepository, TaxonomyRepository,
    };
    use crate::taxonomy::domain::{BuildRecord, BuildType, NewRelation, RelationType};
    use crate::taxonomy::services::ComponentTreeBuilder;

    fn definitions(yaml: &str) -> ProductDefinitions {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    const RHEL: &str = r#"
products:
  - name: rhel
    versions:
      - name: rhel-8
        streams:
          - name: rhel-8.6.0
            brew_tags:
              rhel-8.6.0-candidate: true
            variants:
              - name: AppStream-8.6.0.Z.MAIN
                channels:
                  - name: rhel-8-for-x86_64-appstream-rpms
          - name: rhel-8.8.0
"#;

    const RHEL_MOVED: &str = r#"
products:
  - name: rhel
    versions:
      - name: rhel-8
        streams:
          - name: rhel-8.6.0
          - name: rhel-8.8.0
            variants:
              - name: AppStream-8.6.0.Z.MAIN
                channels:
                  - name: rhel-8-for-x86_64-appstream-rpms
"#;

    fn errata(product_ref: &str) -> NewRelation {
        NewRelation {
            relation_type: RelationType::Errata,
            external_system_id: format!("RHBA-2023:{}", product_ref),
            product_ref: product_ref.to_string(),
            build_id: "1".to_string(),
            build_type: "BREW".to_string(),
            meta_attr: Default::default(),
        }
    }

    /// Ingests build 1 and materializes it against `product_ref`
    fn linked_build<S: RegistryStore>(store: &S, product_ref: &str) -> Uuid {
        let record: BuildRecord = serde_json::from_str(
            r#"{
                "build_meta": {"build_id": "1", "build_type": "BREW"},
                "tree": {"type": "RPM", "meta": {"name": "foo", "version": "1.0", "release": "1", "arch": "src"}}
            }"#,
        )
        .unwrap();
        ComponentTreeBuilder::new(store).ingest(&record, false).unwrap();
        store.add_relation(&errata(product_ref)).unwrap();
        TaxonomyMaterializer::new(store)
            .materialize(&BuildKey::new("1", BuildType::Brew))
            .unwrap();
        store
            .find_component_by_purl("pkg:rpm/redhat/foo@1.0-1?arch=src")
            .unwrap()
            .unwrap()
            .uuid
    }

    fn node_of<S: RegistryStore>(store: &S, level: ProductLevel, name: &str) -> Vec<Node> {
        let model = store.find_product_model(level, name).unwrap().unwrap();
        store.nodes_for_payload(model.payload_ref()).unwrap()
    }

    #[test]
    fn test_load_builds_hierarchy() {
        let store = registry();
        let report = ProductTreeBuilder::new(&store).load(&definitions(RHEL)).unwrap();

        assert_eq!(report.models_created, 5);
        assert_eq!(report.channels_created, 1);
        assert_eq!(report.nodes_created, 6);

        let stream = store
            .find_product_model(ProductLevel::ProductStream, "rhel-8.6.0")
            .unwrap()
            .unwrap();
        assert_eq!(stream.ofuri, "o:redhat:rhel:8.6.0");
        assert!(stream.stream.as_ref().unwrap().active);

        let variant = store
            .find_product_model(ProductLevel::ProductVariant, "AppStream-8.6.0.Z.MAIN")
            .unwrap()
            .unwrap();
        assert_eq!(variant.lineage.product_stream, Some(stream.uuid));
        assert_eq!(variant.ofuri, "o:redhat:rhel:8.6.0:appstream-8.6.0.z.main");
    }

    #[test]
    fn test_reload_is_idempotent() {
        let store = registry();
        let builder = ProductTreeBuilder::new(&store);
        builder.load(&definitions(RHEL)).unwrap();
        let again = builder.load(&definitions(RHEL)).unwrap();

        assert_eq!(again.models_created, 0);
        assert_eq!(again.nodes_created, 0);
        assert!(again.reparented.is_empty());
    }

    #[test]
    fn test_variant_reparenting_moves_subtree_and_returns_builds() {
        let store = registry();
        let builder = ProductTreeBuilder::new(&store);
        builder.load(&definitions(RHEL)).unwrap();
        store
            .add_relation(&errata("AppStream-8.6.0.Z.MAIN"))
            .unwrap();

        let report = builder.load(&definitions(RHEL_MOVED)).unwrap();
        assert_eq!(report.reparented.len(), 1);
        assert_eq!(report.reparented[0].to_stream, "rhel-8.8.0");
        assert_eq!(
            report.builds_to_rematerialize(),
            vec![BuildKey::new("1", BuildType::Brew)]
        );

        let new_stream = node_of(&store, ProductLevel::ProductStream, "rhel-8.8.0");
        let variant_nodes = node_of(&store, ProductLevel::ProductVariant, "AppStream-8.6.0.Z.MAIN");
        assert_eq!(variant_nodes.len(), 1);
        assert_eq!(variant_nodes[0].parent_id(), Some(new_stream[0].id()));

        let channel_nodes: Vec<Node> = store.children(&variant_nodes[0]).unwrap();
        assert_eq!(channel_nodes.len(), 1, "channel moved with the variant");
        assert!(new_stream[0].is_ancestor_of(&channel_nodes[0]));

        let variant = store
            .find_product_model(ProductLevel::ProductVariant, "AppStream-8.6.0.Z.MAIN")
            .unwrap()
            .unwrap();
        assert_eq!(variant.ofuri, "o:redhat:rhel:8.8.0:appstream-8.6.0.z.main");
    }

    #[test]
    fn test_reparenting_drops_links_of_the_old_stream() {
        let store = registry();
        let builder = ProductTreeBuilder::new(&store);
        builder.load(&definitions(RHEL)).unwrap();
        let foo = linked_build(&store, "AppStream-8.6.0.Z.MAIN");
        let old_stream = node_of(&store, ProductLevel::ProductStream, "rhel-8.6.0")[0].payload().id;
        assert!(store
            .product_links(foo)
            .unwrap()
            .contains(ProductLevel::ProductStream, &old_stream));

        let report = builder.load(&definitions(RHEL_MOVED)).unwrap();
        assert!(report.reparented[0].links_removed > 0);

        let new_stream = node_of(&store, ProductLevel::ProductStream, "rhel-8.8.0")[0].payload().id;
        let links = store.product_links(foo).unwrap();
        assert!(!links.contains(ProductLevel::ProductStream, &old_stream));
        assert!(links.contains(ProductLevel::ProductStream, &new_stream));
        assert_eq!(links.count(ProductLevel::ProductVariant), 1);
        assert_eq!(links.count(ProductLevel::Channel), 1);
    }

    #[test]
    fn test_stream_that_stops_listing_a_variant_loses_its_node() {
        let store = registry();
        let builder = ProductTreeBuilder::new(&store);
        let both = r#"
products:
  - name: rhel
    versions:
      - name: rhel-8
        streams:
          - name: rhel-8.6.0
            variants:
              - name: BaseOS-8.6.0.Z.MAIN
          - name: rhel-8.6.0.z
            variants:
              - name: BaseOS-8.6.0.Z.MAIN
"#;
        let one = r#"
products:
  - name: rhel
    versions:
      - name: rhel-8
        streams:
          - name: rhel-8.6.0
            variants:
              - name: BaseOS-8.6.0.Z.MAIN
          - name: rhel-8.6.0.z
"#;
        builder.load(&definitions(both)).unwrap();
        let foo = linked_build(&store, "BaseOS-8.6.0.Z.MAIN");
        let z_stream = node_of(&store, ProductLevel::ProductStream, "rhel-8.6.0.z");
        let z_uuid = z_stream[0].payload().id;
        assert!(store.product_links(foo).unwrap().contains(ProductLevel::ProductStream, &z_uuid));

        let report = builder.load(&definitions(one)).unwrap();
        assert!(report.reparented.is_empty());
        assert_eq!(report.detached.len(), 1);
        assert_eq!(report.detached[0].variant, "BaseOS-8.6.0.Z.MAIN");
        assert_eq!(report.detached[0].from_stream, "rhel-8.6.0.z");
        assert_eq!(
            report.builds_to_rematerialize(),
            vec![BuildKey::new("1", BuildType::Brew)]
        );

        let variant_nodes = node_of(&store, ProductLevel::ProductVariant, "BaseOS-8.6.0.Z.MAIN");
        assert_eq!(variant_nodes.len(), 1);
        assert!(store.children(&z_stream[0]).unwrap().is_empty());
        let links = store.product_links(foo).unwrap();
        assert!(!links.contains(ProductLevel::ProductStream, &z_uuid));
        assert_eq!(links.count(ProductLevel::ProductStream), 1);

        let again = builder.load(&definitions(one)).unwrap();
        assert!(again.detached.is_empty());
    }

    #[test]
    fn test_variant_listed_under_two_streams_gets_two_nodes() {
        let store = registry();
        let yaml = r#"
products:
  - name: rhel
    versions:
      - name: rhel-8
        streams:
          - name: rhel-8.6.0
            variants:
              - name: BaseOS-8.6.0.Z.MAIN
          - name: rhel-8.6.0.z
            variants:
              - name: BaseOS-8.6.0.Z.MAIN
"#;
        let report = ProductTreeBuilder::new(&store).load(&definitions(yaml)).unwrap();
        assert!(report.reparented.is_empty());
        assert_eq!(node_of(&store, ProductLevel::ProductVariant, "BaseOS-8.6.0.Z.MAIN").len(), 2);
    }
}
