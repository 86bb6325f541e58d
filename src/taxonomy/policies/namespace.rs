use crate::taxonomy::domain::{ComponentType, Namespace};

/// Position of a record in the collector tree, as far as namespacing cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreePosition {
    Root,
    Child,
    Upstream,
}

/// NamespacePolicy decides whether a component was built by Red Hat
///
/// An explicit namespace on the record always wins. Otherwise roots are
/// REDHAT, upstream origins are UPSTREAM, and children are REDHAT only for
/// distribution-built types or when their version carries a `redhat` marker.
pub struct NamespacePolicy;

impl NamespacePolicy {
    pub fn decide(
        explicit: Option<&str>,
        position: TreePosition,
        component_type: ComponentType,
        version: &str,
    ) -> Namespace {
        if let Some(namespace) = explicit.and_then(|value| value.parse::<Namespace>().ok()) {
            return namespace;
        }
        match position {
            TreePosition::Root => Namespace::Redhat,
            TreePosition::Upstream => Namespace::Upstream,
            TreePosition::Child => {
                let distro_built = matches!(
                    component_type,
                    ComponentType::Rpm | ComponentType::RpmModule | ComponentType::ContainerImage
                );
                if distro_built || version.contains("redhat") {
                    Namespace::Redhat
                } else {
                    Namespace::Upstream
                }
            }
        }
    }
}
