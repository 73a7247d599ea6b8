//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Paginate aggregation pipelines from the command line
#[derive(Parser, Debug)]
#[command(name = "pipeline-paginate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Default options file (YAML or JSON) applied beneath every call
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a pipeline over a document file and print one page
    Paginate {
        /// Documents: a JSON array, or one JSON document per line (.jsonl)
        #[arg(short, long)]
        data: PathBuf,

        /// Base pipeline file (JSON array of stages)
        #[arg(short, long)]
        pipeline: Option<PathBuf>,

        /// Per-call options file (YAML or JSON); flags below override it
        #[arg(short, long)]
        options: Option<PathBuf>,

        /// Page number (1-based)
        #[arg(long)]
        page: Option<String>,

        /// Page size, or "unlimited"
        #[arg(long)]
        limit: Option<String>,

        /// Sort spec as inline JSON, e.g. '{"createdAt": -1}'
        #[arg(long)]
        sort: Option<String>,

        /// Projection spec as inline JSON, e.g. '{"name": 1}'
        #[arg(long)]
        project: Option<String>,

        /// Key to nest the metadata under
        #[arg(long, conflicts_with = "flat")]
        meta: Option<String>,

        /// Put the metadata beside the docs instead of nesting it
        #[arg(long)]
        flat: bool,

        /// Fail if the page is not ready within this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Print the effective default options
    Defaults,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON on one line
    Json,
    /// Indented JSON
    Pretty,
}
