/// Outbound ports (Driven ports) - Infrastructure interfaces
///
/// These ports define the interfaces that the application core uses
/// to interact with external systems (database, lock backends, collector
/// output, file system, console).
pub mod build_source;
pub mod component_repository;
pub mod definition_reader;
pub mod formatter;
pub mod lock_service;
pub mod manifest_repository;
pub mod node_store;
pub mod output_presenter;
pub mod product_repository;
pub mod progress_reporter;
pub mod registry_store;
pub mod relation_repository;
pub mod task_journal;
pub mod taxonomy_repository;

pub use build_source::BuildMetadataSource;
pub use component_repository::ComponentRepository;
pub use definition_reader::DefinitionReader;
pub use formatter::ComponentListFormatter;
pub use lock_service::{LockGuard, LockKey, LockReleaser, LockService};
pub use manifest_repository::{ManifestRecord, ManifestRepository};
pub use node_store::NodeStore;
pub use output_presenter::OutputPresenter;
pub use product_repository::ProductRepository;
pub use progress_reporter::ProgressReporter;
pub use registry_store::RegistryStore;
pub use relation_repository::RelationRepository;
pub use task_journal::{TaskJournal, TaskRecord, TaskStatus};
pub use taxonomy_repository::TaxonomyRepository;
