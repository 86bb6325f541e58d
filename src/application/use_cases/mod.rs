/// Use cases module containing application business logic orchestration
mod delete_build;
mod generate_manifest;
mod latest_components;
mod repair_taxonomy;
mod run_tasks;

pub use delete_build::{DeleteBuildReport, DeleteBuildUseCase};
pub use generate_manifest::GenerateManifestUseCase;
pub use latest_components::LatestComponentsUseCase;
pub use repair_taxonomy::RepairTaxonomyUseCase;
pub use run_tasks::RunTasksUseCase;
