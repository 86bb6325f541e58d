use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use component_registry::application::dto::OutputFormat;
use component_registry::taxonomy::domain::{BuildKey, BuildType, EdgeType};

/// Assemble component and product trees from build metadata
#[derive(Parser, Debug)]
#[command(name = "component-registry")]
#[command(version)]
#[command(about = "Assemble component and product trees from build metadata", long_about = None)]
pub struct Args {
    /// Config file (defaults to ./component-registry.config.yml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Number of tasks that may run at once
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Directory holding collector output as <build_type>/<build_id>.json
    #[arg(long, global = true)]
    pub collector_dir: Option<PathBuf>,

    /// Seconds to wait before re-materializing builds after a product tree change
    #[arg(long, global = true, value_name = "SECONDS")]
    pub rematerialize_delay: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest collector output for one or more builds
    Ingest {
        #[command(flatten)]
        builds: BuildSelection,

        /// Rebuild the tree even if the build is already stored
        #[arg(long)]
        force: bool,
    },

    /// Load a product definition file (YAML or JSON)
    LoadProducts {
        /// Product definition file
        path: PathBuf,
    },

    /// Load build-to-product evidence records
    LoadRelations {
        /// JSON array of evidence records
        path: PathBuf,

        /// Brew tag to build-id listing; derives BREW_TAG evidence for stream tags
        #[arg(long, value_name = "PATH")]
        tag_builds: Option<PathBuf>,
    },

    /// Derive product links for the components of one or more builds
    Materialize {
        #[command(flatten)]
        builds: BuildSelection,
    },

    /// Re-materialize builds whose components are missing stream links
    Repair {
        /// Continue after this build id
        #[arg(long, value_name = "ID")]
        resume_after: Option<i64>,

        /// Builds read per batch
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// List the latest root components of a product stream
    Latest {
        /// Product stream name
        stream: String,

        /// List every component linked to the stream, not only the latest roots
        #[arg(long)]
        all: bool,

        /// With --all, also list components of an inactive stream
        #[arg(long, requires = "all")]
        include_inactive: bool,

        /// Output format: table or json
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,

        #[command(flatten)]
        output: OutputTarget,
    },

    /// Show the tree(s) below a component (purl) or product entity (name or ofuri)
    Taxonomy {
        /// purl, ofuri, or product entity name
        target: String,

        /// Only follow these component edges; may be repeated
        #[arg(long = "edge", value_name = "EDGE")]
        edges: Vec<EdgeType>,

        #[command(flatten)]
        output: OutputTarget,
    },

    /// Render the package manifest of a stream or component
    Manifest {
        #[command(flatten)]
        subject: ManifestTarget,

        #[command(flatten)]
        output: OutputTarget,
    },

    /// Delete a build and the component trees it owns
    DeleteBuild {
        /// Build id
        build_id: String,

        /// Build system
        #[arg(short = 't', long, default_value = "BREW")]
        build_type: BuildType,
    },
}

#[derive(ClapArgs, Debug)]
pub struct BuildSelection {
    /// Build ids
    #[arg(required = true, value_name = "BUILD_ID")]
    pub build_ids: Vec<String>,

    /// Build system the ids belong to
    #[arg(short = 't', long, default_value = "BREW")]
    pub build_type: BuildType,
}

impl BuildSelection {
    pub fn keys(&self) -> Vec<BuildKey> {
        self.build_ids
            .iter()
            .map(|id| BuildKey::new(id.clone(), self.build_type))
            .collect()
    }
}

#[derive(ClapArgs, Debug)]
#[group(required = true, multiple = false)]
pub struct ManifestTarget {
    /// Product stream name
    #[arg(long)]
    pub stream: Option<String>,

    /// Component purl
    #[arg(long)]
    pub component: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct OutputTarget {
    /// Output file path (if not specified, outputs to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
