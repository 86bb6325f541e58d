use crate::shared::Result;
use crate::taxonomy::domain::{
    BuildKey, Component, ComponentDraft, ComponentKey, SoftwareBuild, SoftwareBuildDraft,
};
use uuid::Uuid;

/// ComponentRepository port for builds and component payload records
pub trait ComponentRepository {
    fn find_build(&self, key: &BuildKey) -> Result<Option<SoftwareBuild>>;

    fn get_build(&self, id: i64) -> Result<Option<SoftwareBuild>>;

    /// Inserts the build or refreshes its attributes, returning whether it was new
    fn save_build(&self, draft: &SoftwareBuildDraft) -> Result<(SoftwareBuild, bool)>;

    /// Builds with a primary key above `after_id`, in key order
    fn builds_after(&self, after_id: Option<i64>, limit: usize) -> Result<Vec<SoftwareBuild>>;

    fn delete_build(&self, id: i64) -> Result<()>;

    fn find_component(&self, key: &ComponentKey) -> Result<Option<Component>>;

    fn get_component(&self, uuid: Uuid) -> Result<Option<Component>>;

    fn find_component_by_purl(&self, purl: &str) -> Result<Option<Component>>;

    /// Creates the component or merges the draft into the stored one.
    ///
    /// Runs inside one immediate transaction so concurrent merges of the same
    /// key do not lose each other's metadata.
    fn upsert_component(&self, draft: &ComponentDraft) -> Result<(Component, bool)>;

    /// Components whose owning build is `build_id`
    fn components_for_build(&self, build_id: i64) -> Result<Vec<Component>>;
}
