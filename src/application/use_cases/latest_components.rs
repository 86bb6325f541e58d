use crate::application::dto::LatestRequest;
use crate::application::read_models::{ComponentListView, ComponentView};
use crate::ports::outbound::RegistryStore;
use crate::shared::Result;
use crate::taxonomy::services::LatestRootSelector;
use std::collections::HashMap;

/// LatestComponentsUseCase - lists the current components of a product stream
pub struct LatestComponentsUseCase<'a, S: RegistryStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RegistryStore + ?Sized> LatestComponentsUseCase<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn execute(&self, request: &LatestRequest) -> Result<ComponentListView> {
        let selector = LatestRootSelector::new(self.store);
        let components = if request.all_components {
            selector.latest_components(&request.stream, request.include_inactive)?
        } else {
            selector.latest_roots(&request.stream)?
        };

        let mut builds = HashMap::new();
        let mut views = Vec::with_capacity(components.len());
        for component in &components {
            let build = match component.software_build {
                Some(id) => {
                    if !builds.contains_key(&id) {
                        builds.insert(id, self.store.get_build(id)?);
                    }
                    builds.get(&id).and_then(Option::as_ref)
                }
                None => None,
            };
            views.push(ComponentView::new(component, build));
        }

        Ok(ComponentListView {
            stream: request.stream.clone(),
            roots_only: !request.all_components,
            components: views,
        })
    }
}
