//! Configuration file support for component-registry.
//!
//! Provides YAML-based configuration through `component-registry.config.yml`
//! files, including data structures, file loading, validation, and the
//! merge with command-line overrides.

use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use component_registry::shared::Result;

pub const CONFIG_FILENAME: &str = "component-registry.config.yml";

const DEFAULT_DATABASE: &str = "component-registry.db";
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
const DEFAULT_RETRY_BACKOFF_MAX_MS: u64 = 30_000;
const DEFAULT_REMATERIALIZE_DELAY_SECS: u64 = 300;
const DEFAULT_BATCH_SIZE: usize = 100;

/// Top-level configuration file schema.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub database: Option<PathBuf>,
    pub workers: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub retry_backoff_max_ms: Option<u64>,
    pub rematerialize_delay_secs: Option<u64>,
    pub batch_size: Option<usize>,
    pub lock_backend: Option<String>,
    pub log_level: Option<String>,
    pub collector_dir: Option<PathBuf>,
    /// Captures unknown fields for warnings.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_yaml_ng::Value>,
}

/// Where task locks live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockBackend {
    /// Held by this process only
    Memory,
    /// `task_locks` table, shared by every process using the database
    Sqlite,
}

impl std::str::FromStr for LockBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(LockBackend::Memory),
            "sqlite" => Ok(LockBackend::Sqlite),
            _ => Err(format!(
                "Invalid lock backend: {}. Please specify 'memory' or 'sqlite'",
                s
            )),
        }
    }
}

/// Effective settings after merging defaults, the config file and CLI flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: PathBuf,
    pub workers: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub retry_backoff_max: Duration,
    pub rematerialize_delay: Duration,
    pub batch_size: usize,
    pub lock_backend: LockBackend,
    pub log_level: Option<String>,
    pub collector_dir: PathBuf,
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database: Option<PathBuf>,
    pub workers: Option<usize>,
    pub collector_dir: Option<PathBuf>,
    pub rematerialize_delay_secs: Option<u64>,
}

impl Settings {
    /// Resolves settings; CLI overrides win over the file, the file over defaults
    pub fn resolve(config: Option<ConfigFile>, overrides: Overrides) -> Result<Self> {
        let config = config.unwrap_or_default();
        let lock_backend = match config.lock_backend.as_deref() {
            Some(name) => name.parse().map_err(anyhow::Error::msg)?,
            None => LockBackend::Sqlite,
        };
        let settings = Self {
            database: overrides
                .database
                .or(config.database)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
            workers: overrides
                .workers
                .or(config.workers)
                .unwrap_or(DEFAULT_WORKERS),
            max_retries: config.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_backoff: Duration::from_millis(
                config.retry_backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS),
            ),
            retry_backoff_max: Duration::from_millis(
                config
                    .retry_backoff_max_ms
                    .unwrap_or(DEFAULT_RETRY_BACKOFF_MAX_MS),
            ),
            rematerialize_delay: Duration::from_secs(
                overrides
                    .rematerialize_delay_secs
                    .or(config.rematerialize_delay_secs)
                    .unwrap_or(DEFAULT_REMATERIALIZE_DELAY_SECS),
            ),
            batch_size: config.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            lock_backend,
            log_level: config.log_level,
            collector_dir: overrides
                .collector_dir
                .or(config.collector_dir)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        if settings.workers == 0 {
            bail!("Invalid settings: workers must be at least 1.\n\n💡 Hint: Set 'workers' in the config file or pass --workers.");
        }
        Ok(settings)
    }
}

/// Load config from an explicit path. Returns an error if the file is not found.
pub fn load_config_from_path(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read config file: {}\n\n💡 Hint: Check that the file exists and is readable.",
            path.display()
        )
    })?;

    let config: ConfigFile = serde_yaml_ng::from_str(&content).with_context(|| {
        format!(
            "Failed to parse config file: {}\n\n💡 Hint: Ensure the file contains valid YAML syntax.",
            path.display()
        )
    })?;

    validate_config(&config)?;
    warn_unknown_fields(&config);

    Ok(config)
}

/// Auto-discover config in a directory. Returns `None` silently if not found.
pub fn discover_config(dir: &Path) -> Result<Option<ConfigFile>> {
    let config_path = dir.join(CONFIG_FILENAME);

    if !config_path.exists() {
        return Ok(None);
    }

    let config = load_config_from_path(&config_path)?;
    Ok(Some(config))
}

/// Validate the loaded configuration.
fn validate_config(config: &ConfigFile) -> Result<()> {
    if config.workers == Some(0) {
        bail!("Invalid config: workers must be at least 1.\n\n💡 Hint: Remove the field to use the default of {}.", DEFAULT_WORKERS);
    }
    if config.batch_size == Some(0) {
        bail!("Invalid config: batch_size must be at least 1.\n\n💡 Hint: Remove the field to use the default of {}.", DEFAULT_BATCH_SIZE);
    }
    let backoff = config.retry_backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS);
    let backoff_max = config
        .retry_backoff_max_ms
        .unwrap_or(DEFAULT_RETRY_BACKOFF_MAX_MS);
    if backoff > backoff_max {
        bail!(
            "Invalid config: retry_backoff_ms ({}) is greater than retry_backoff_max_ms ({}).\n\n\
             💡 Hint: The first retry delay cannot exceed the cap.",
            backoff,
            backoff_max
        );
    }
    if let Some(ref backend) = config.lock_backend {
        if let Err(message) = backend.parse::<LockBackend>() {
            bail!("Invalid config: {}.", message);
        }
    }
    Ok(())
}

/// Warn about unknown fields in the config file.
fn warn_unknown_fields(config: &ConfigFile) {
    for key in config.unknown_fields.keys() {
        eprintln!(
            "⚠️  Warning: Unknown config field '{}' will be ignored.",
            key
        );
    }
}
