//! CLI commands and argument parsing

use crate::transform::TransformPreset;
use crate::transport::LayoutPreset;
use crate::types::{Environment, PageKey};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Paginated ledger fetch, validation and forwarding
#[derive(Parser, Debug)]
#[command(name = "ledger-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch pages and run them through the pipeline
    Fetch(FetchArgs),

    /// Schema discovery and inspection
    #[command(subcommand)]
    Schema(SchemaCommand),

    /// Validate and transform records from a file, printing the result
    Validate {
        /// JSON array, single object or JSON lines file
        input: PathBuf,

        /// Built-in schema name or mapping file
        #[arg(long)]
        schema: Option<String>,

        /// Transform preset
        #[arg(long)]
        transform: Option<TransformPreset>,
    },
}

/// Options of `fetch`; each overrides the run configuration
#[derive(Args, Debug, Default)]
pub struct FetchArgs {
    /// Print records to stdout
    #[arg(short, long)]
    pub stdout: bool,

    /// Forward records to a log-forwarding agent
    #[arg(short, long)]
    pub forward: bool,

    /// Forwarding agent host
    #[arg(long)]
    pub forward_host: Option<String>,

    /// Forwarding agent port
    #[arg(long)]
    pub forward_port: Option<u16>,

    /// Forwarding tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Environment label prefixed to the forwarding tag
    #[arg(long = "env", value_enum)]
    pub environment: Option<Environment>,

    /// WebSocket endpoint
    #[arg(long)]
    pub url: Option<String>,

    /// JSON-RPC endpoint for resolving `current`; empty disables it
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// First page key (ledger index) or `current`
    #[arg(long)]
    pub start: Option<PageKey>,

    /// Keep following `current` after each completed sequence
    #[arg(long)]
    pub repeat: bool,

    /// Message layout
    #[arg(long, value_enum)]
    pub layout: Option<LayoutPreset>,

    /// Built-in schema name or mapping file used for validation
    #[arg(long)]
    pub schema: Option<String>,

    /// Skip validation
    #[arg(long, conflicts_with = "schema")]
    pub no_validate: bool,

    /// Transform preset
    #[arg(long)]
    pub transform: Option<TransformPreset>,

    /// This worker's shard
    #[arg(long, requires = "shard_size")]
    pub shard_index: Option<u64>,

    /// Number of shards
    #[arg(long, requires = "shard_index")]
    pub shard_size: Option<u64>,

    /// Run this many shards concurrently, one connection each
    #[arg(long, conflicts_with_all = ["shard_index", "shard_size"])]
    pub shards: Option<u64>,

    /// Write the observed schema to this file when the run completes
    #[arg(long)]
    pub schema_output: Option<PathBuf>,

    /// Log a path summary for every payment
    #[arg(long)]
    pub payments: bool,
}

/// Schema subcommands
#[derive(Subcommand, Debug)]
pub enum SchemaCommand {
    /// Discover the schema of records in a file
    Collect {
        /// JSON array, single object or JSON lines file
        input: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: SchemaFormat,
    },

    /// Merge mapping files
    Merge {
        /// YAML or JSON mapping files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "yaml")]
        format: SchemaFormat,
    },

    /// Print a built-in schema
    Show {
        /// Built-in schema name
        name: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: SchemaFormat,
    },

    /// List built-in schemas
    List,
}

/// Schema output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SchemaFormat {
    /// `path<TAB>{kinds}` lines
    #[default]
    Plain,
    /// Like plain, with warehouse column type names
    Warehouse,
    /// YAML mapping, loadable as a declared schema
    Yaml,
    /// JSON mapping, loadable as a declared schema
    Json,
}
