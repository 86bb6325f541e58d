use super::task::{Task, TaskResult};
use crate::adapters::outbound::sqlite::SqliteRegistry;
use crate::ports::outbound::{BuildMetadataSource, DefinitionReader};
use crate::shared::Result;
use crate::taxonomy::domain::BuildKey;
use crate::taxonomy::services::{
    ComponentTreeBuilder, IngestStatus, ProductTreeBuilder, RelationLoader, TaxonomyMaterializer,
};
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Executes one task; the scheduler owns locking, retries and journaling
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &Task) -> Result<TaskResult>;
}

/// Runs tasks against a SQLite registry file.
///
/// Every task opens its own connection inside a blocking section, so tasks
/// on different workers never share a connection.
pub struct RegistryTaskHandler<B, D> {
    database: PathBuf,
    source: Arc<B>,
    definitions: Arc<D>,
    rematerialize_delay: Duration,
}

impl<B, D> RegistryTaskHandler<B, D>
where
    B: BuildMetadataSource + 'static,
    D: DefinitionReader + Send + Sync + 'static,
{
    /// # Arguments
    /// * `rematerialize_delay` - wait before re-deriving links after a
    ///   product tree change, so a burst of loads collapses into one pass
    pub fn new(
        database: PathBuf,
        source: Arc<B>,
        definitions: Arc<D>,
        rematerialize_delay: Duration,
    ) -> Self {
        Self {
            database,
            source,
            definitions,
            rematerialize_delay,
        }
    }

    async fn ingest(&self, key: &BuildKey, force: bool) -> Result<TaskResult> {
        let record = self.source.fetch_build(key).await?;
        let database = self.database.clone();
        let report = blocking(move || {
            let store = SqliteRegistry::open(&database)?;
            ComponentTreeBuilder::new(&store).ingest(&record, force)
        })
        .await?;

        for skipped in &report.skipped {
            tracing::warn!(build = %report.build_label, subtree = %skipped.label, reason = %skipped.reason, "subtree left out");
        }
        Ok(match report.status {
            IngestStatus::Ingested => TaskResult::done(format!(
                "{}: {} component(s) created, {} link set(s) saved",
                report.build_label, report.components_created, report.links_saved
            ))
            .then(Task::Materialize { key: key.clone() }, Duration::ZERO),
            IngestStatus::AlreadyIngested => {
                TaskResult::skipped(format!("{} is already ingested", report.build_label))
            }
            IngestStatus::UnsupportedBuildType => {
                TaskResult::skipped(format!("{} has an unsupported build type", report.build_label))
            }
        })
    }

    async fn materialize(&self, key: &BuildKey) -> Result<TaskResult> {
        let database = self.database.clone();
        let target = key.clone();
        let report = blocking(move || {
            let store = SqliteRegistry::open(&database)?;
            TaxonomyMaterializer::new(&store).materialize(&target)
        })
        .await?;

        if !report.build_found {
            return Ok(TaskResult::skipped(format!("{} is not ingested yet", key)));
        }
        Ok(TaskResult::done(format!(
            "{}: {} component(s) across {} stream(s), {} link(s) added",
            key,
            report.components,
            report.streams.len(),
            report.links_added
        )))
    }

    async fn load_products(&self, path: &Path) -> Result<TaskResult> {
        let database = self.database.clone();
        let definitions = self.definitions.clone();
        let path = path.to_path_buf();
        let report = blocking(move || {
            let parsed = definitions.read_products(&path)?;
            let store = SqliteRegistry::open(&database)?;
            ProductTreeBuilder::new(&store).load(&parsed)
        })
        .await?;

        let mut result = TaskResult::done(format!(
            "{} model(s) and {} channel(s) created, {} variant(s) re-parented, {} detached",
            report.models_created,
            report.channels_created,
            report.reparented.len(),
            report.detached.len()
        ));
        for key in report.builds_to_rematerialize() {
            result = result.then(Task::Materialize { key }, self.rematerialize_delay);
        }
        Ok(result)
    }

    async fn load_relations(&self, path: &Path, tag_builds: Option<&Path>) -> Result<TaskResult> {
        let database = self.database.clone();
        let definitions = self.definitions.clone();
        let path = path.to_path_buf();
        let tag_builds = tag_builds.map(Path::to_path_buf);
        let report = blocking(move || {
            let mut relations = definitions.read_relations(&path)?;
            let store = SqliteRegistry::open(&database)?;
            let loader = RelationLoader::new(&store);
            if let Some(tag_path) = tag_builds {
                let listing = definitions.read_tag_builds(&tag_path)?;
                relations.extend(loader.derive_brew_tag_relations(&listing)?);
            }
            loader.load(&relations)
        })
        .await?;

        let mut result = TaskResult::done(format!(
            "{} relation(s) created, {} already known",
            report.created, report.existing
        ));
        for key in report.builds {
            result = result.then(Task::Materialize { key }, Duration::ZERO);
        }
        Ok(result)
    }
}

#[async_trait]
impl<B, D> TaskHandler for RegistryTaskHandler<B, D>
where
    B: BuildMetadataSource + 'static,
    D: DefinitionReader + Send + Sync + 'static,
{
    async fn handle(&self, task: &Task) -> Result<TaskResult> {
        tracing::debug!(task = %task, "handling task");
        match task {
            Task::IngestBuild { key, force } => self.ingest(key, *force).await,
            Task::Materialize { key } => self.materialize(key).await,
            Task::LoadProducts { path } => self.load_products(path).await,
            Task::LoadRelations { path, tag_builds } => {
                self.load_relations(path, tag_builds.as_deref()).await
            }
        }
    }
}

/// Runs SQLite work off the async workers
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .context("registry task panicked")?
}
