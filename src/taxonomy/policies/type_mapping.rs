use crate::shared::error::RegistryError;
use crate::taxonomy::domain::ComponentType;

/// Result of normalizing a collector type token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedType {
    pub component_type: ComponentType,
    /// Original Go token (`gomod` or `go-package`), kept in meta_attr
    pub go_component_type: Option<String>,
}

/// TypeMapping policy for collector-specific type tokens
///
/// Collectors report package-manager names (`pip`, `yarn`, `gomod`, ...).
/// They are normalized to the closed [`ComponentType`] set before any lookup.
/// Tokens that already name an enum member are accepted case-insensitively.
pub struct TypeMapping;

impl TypeMapping {
    pub fn resolve(token: &str) -> Result<MappedType, RegistryError> {
        let lowered = token.trim().to_lowercase();
        let (component_type, go_component_type) = match lowered.as_str() {
            "gomod" | "go-package" => (ComponentType::Golang, Some(lowered.clone())),
            "pip" => (ComponentType::Pypi, None),
            "npm" | "yarn" => (ComponentType::Npm, None),
            "rubygems" => (ComponentType::Gem, None),
            "cargo" => (ComponentType::Cargo, None),
            "git-submodule" => (ComponentType::Github, None),
            _ => {
                let parsed = lowered.parse::<ComponentType>().map_err(|_| {
                    RegistryError::UnsupportedComponentType {
                        token: token.to_string(),
                    }
                })?;
                (parsed, None)
            }
        };
        Ok(MappedType {
            component_type,
            go_component_type,
        })
    }
}
