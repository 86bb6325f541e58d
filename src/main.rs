mod cli;
mod config;

use cli::{Args, Command};
use component_registry::adapters::outbound::console::StderrProgressReporter;
use component_registry::adapters::outbound::filesystem::FileSystemReader;
use component_registry::adapters::outbound::memory::InMemoryLockService;
use component_registry::adapters::outbound::sqlite::{
    SqliteLockService, SqliteRegistry, SqliteTaskJournal,
};
use component_registry::application::dto::{LatestRequest, RunSummary};
use component_registry::application::factories::{
    FormatterFactory, PresenterFactory, PresenterType,
};
use component_registry::application::read_models::TaxonomyViewBuilder;
use component_registry::application::scheduler::{
    RegistryTaskHandler, RetryPolicy, Task, TaskScheduler,
};
use component_registry::application::use_cases::{
    DeleteBuildUseCase, GenerateManifestUseCase, LatestComponentsUseCase, RepairTaxonomyUseCase,
    RunTasksUseCase,
};
use component_registry::ports::outbound::{LockService, ProgressReporter};
use component_registry::shared::error::ExitCode;
use component_registry::shared::Result;
use component_registry::taxonomy::domain::BuildKey;
use component_registry::taxonomy::services::ManifestSubject;
use config::{LockBackend, Overrides, Settings};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();

    let exit_code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\n{}\n", "❌ An error occurred:".red().bold());
            eprintln!("{}", e);

            // Display error chain
            for cause in e.chain().skip(1) {
                eprintln!("\nCaused by: {}", cause);
            }

            eprintln!();
            ExitCode::ApplicationError
        }
    };
    process::exit(exit_code.as_i32());
}

async fn run(args: Args) -> Result<ExitCode> {
    let config_file = match args.config.as_deref() {
        Some(path) => Some(config::load_config_from_path(path)?),
        None => config::discover_config(&std::env::current_dir()?)?,
    };
    let settings = Settings::resolve(
        config_file,
        Overrides {
            database: args.database,
            workers: args.workers,
            collector_dir: args.collector_dir,
            rematerialize_delay_secs: args.rematerialize_delay,
        },
    )?;
    init_logging(settings.log_level.as_deref());
    tracing::debug!(database = %settings.database.display(), workers = settings.workers, "settings resolved");

    match args.command {
        Command::Ingest { builds, force } => {
            let tasks = builds
                .keys()
                .into_iter()
                .map(|key| Task::IngestBuild { key, force })
                .collect();
            run_tasks(&settings, tasks).await
        }
        Command::Materialize { builds } => {
            let tasks = builds
                .keys()
                .into_iter()
                .map(|key| Task::Materialize { key })
                .collect();
            run_tasks(&settings, tasks).await
        }
        Command::LoadProducts { path } => {
            run_tasks(&settings, vec![Task::LoadProducts { path }]).await
        }
        Command::LoadRelations { path, tag_builds } => {
            run_tasks(&settings, vec![Task::LoadRelations { path, tag_builds }]).await
        }
        Command::Repair {
            resume_after,
            batch_size,
        } => {
            let store = SqliteRegistry::open(&settings.database)?;
            RepairTaxonomyUseCase::new(&store, StderrProgressReporter::new())
                .execute(resume_after, batch_size.unwrap_or(settings.batch_size))?;
            Ok(ExitCode::Success)
        }
        Command::Latest {
            stream,
            all,
            include_inactive,
            format,
            output,
        } => {
            let store = SqliteRegistry::open(&settings.database)?;
            let request = LatestRequest {
                stream,
                all_components: all,
                include_inactive,
            };
            let view = LatestComponentsUseCase::new(&store).execute(&request)?;
            let content = FormatterFactory::create(format).format(&view)?;
            present(output.output, &content)?;
            Ok(ExitCode::Success)
        }
        Command::Taxonomy {
            target,
            edges,
            output,
        } => {
            let store = SqliteRegistry::open(&settings.database)?;
            let view = TaxonomyViewBuilder::new(&store).build(&target, &edges)?;
            present(output.output, &serde_json::to_string_pretty(&view)?)?;
            Ok(ExitCode::Success)
        }
        Command::Manifest { subject, output } => {
            let subject = match (subject.stream, subject.component) {
                (Some(stream), _) => ManifestSubject::Stream(stream),
                (None, Some(purl)) => ManifestSubject::Component(purl),
                (None, None) => anyhow::bail!("Either --stream or --component is required"),
            };
            let store = SqliteRegistry::open(&settings.database)?;
            let content = GenerateManifestUseCase::new(&store, StderrProgressReporter::new())
                .execute(&subject)?;
            present(output.output, &content)?;
            Ok(ExitCode::Success)
        }
        Command::DeleteBuild {
            build_id,
            build_type,
        } => {
            let store = SqliteRegistry::open(&settings.database)?;
            let key = BuildKey::new(build_id, build_type);
            let report = DeleteBuildUseCase::new(&store).execute(&key)?;
            StderrProgressReporter::new().report_completion(&format!(
                "🗑️  Deleted {}: {} node(s) removed, {} component(s) relinked",
                key, report.nodes_removed, report.components_relinked
            ));
            Ok(ExitCode::Success)
        }
    }
}

async fn run_tasks(settings: &Settings, tasks: Vec<Task>) -> Result<ExitCode> {
    // Creates the schema before any worker connects
    SqliteRegistry::open(&settings.database)?;

    let locks: Arc<dyn LockService> = match settings.lock_backend {
        LockBackend::Memory => Arc::new(InMemoryLockService::new()),
        LockBackend::Sqlite => Arc::new(SqliteLockService::open(&settings.database)?),
    };
    let journal = Arc::new(SqliteTaskJournal::open(&settings.database)?);
    let reader = Arc::new(FileSystemReader::with_collector_dir(
        settings.collector_dir.clone(),
    ));
    let handler = Arc::new(RegistryTaskHandler::new(
        settings.database.clone(),
        reader.clone(),
        reader,
        settings.rematerialize_delay,
    ));
    let retry = RetryPolicy::new(
        settings.max_retries,
        settings.retry_backoff,
        settings.retry_backoff_max,
    );
    let scheduler = TaskScheduler::start(locks, journal, handler, settings.workers, retry)?;

    let summary: RunSummary = RunTasksUseCase::new(scheduler, StderrProgressReporter::new())
        .execute(tasks)
        .await;
    Ok(if summary.has_failures() {
        ExitCode::TaskFailures
    } else {
        ExitCode::Success
    })
}

fn present(output: Option<PathBuf>, content: &str) -> Result<()> {
    PresenterFactory::create(PresenterType::for_output(output)).present(content)
}

/// RUST_LOG wins, then the configured level, then `info`
fn init_logging(config_level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_level.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
