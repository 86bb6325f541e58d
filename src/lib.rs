//! component-registry - build-to-product taxonomy engine
//!
//! This library ingests build metadata into two linked trees, a product
//! taxonomy (product → version → stream → variant → channel) and a component
//! dependency graph, and derives which products every component ships in.
//! It follows hexagonal architecture and Domain-Driven Design principles.
//!
//! # Architecture
//!
//! The library is organized into the following layers:
//!
//! - **Domain Layer** (`taxonomy`): Tree and payload models, policies and services
//! - **Application Layer** (`application`): Use cases, read models and the task scheduler
//! - **Ports** (`ports`): Interface definitions for infrastructure
//! - **Adapters** (`adapters`): SQLite storage, lock services, filesystem and console
//! - **Shared** (`shared`): Common utilities and error types
//!
//! # Example
//!
//! ```no_run
//! use component_registry::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<()> {
//! let store = SqliteRegistry::open(Path::new("registry.db"))?;
//!
//! // Load the product tree, then derive links for an ingested build
//! let definitions = FileSystemReader::new().read_products(Path::new("products.yml"))?;
//! ProductTreeBuilder::new(&store).load(&definitions)?;
//! TaxonomyMaterializer::new(&store).materialize(&BuildKey::new("1", BuildType::Brew))?;
//!
//! // Latest root components of a stream
//! for component in LatestRootSelector::new(&store).latest_roots("rhel-8.6.0")? {
//!     println!("{}", component.purl);
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod application;
pub mod ports;
pub mod shared;
pub mod taxonomy;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::outbound::console::StderrProgressReporter;
    pub use crate::adapters::outbound::filesystem::{
        FileSystemReader, FileSystemWriter, StdoutPresenter,
    };
    pub use crate::adapters::outbound::formatters::{JsonFormatter, TableFormatter};
    pub use crate::adapters::outbound::memory::InMemoryLockService;
    pub use crate::adapters::outbound::sqlite::{
        SqliteLockService, SqliteRegistry, SqliteTaskJournal,
    };
    pub use crate::application::dto::{LatestRequest, OutputFormat, RunSummary};
    pub use crate::application::read_models::{
        ComponentListView, ComponentView, TaxonomyView, TaxonomyViewBuilder,
    };
    pub use crate::application::scheduler::{
        RegistryTaskHandler, RetryPolicy, Task, TaskHandler, TaskOutcome, TaskResult,
        TaskScheduler,
    };
    pub use crate::application::use_cases::{
        DeleteBuildUseCase, GenerateManifestUseCase, LatestComponentsUseCase,
        RepairTaxonomyUseCase, RunTasksUseCase,
    };
    pub use crate::ports::outbound::{
        BuildMetadataSource, ComponentListFormatter, ComponentRepository, DefinitionReader,
        LockService, ManifestRepository, NodeStore, OutputPresenter, ProductRepository,
        ProgressReporter, RegistryStore, RelationRepository, TaskJournal, TaxonomyRepository,
    };
    pub use crate::shared::error::{ExitCode, RegistryError};
    pub use crate::shared::Result;
    pub use crate::taxonomy::domain::{
        BuildKey, BuildRecord, BuildType, Component, ComponentLinks, ComponentType, EdgeType,
        NewRelation, Node, NodeKind, NodePayload, ProductDefinitions, ProductLevel, RelationType,
    };
    pub use crate::taxonomy::services::{
        ComponentTreeBuilder, IngestStatus, LatestRootSelector, ManifestBuilder,
        ManifestSubject, ProductTreeBuilder, RelationLoader, TaxonomyMaterializer,
    };
}
