use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::pipeline::DEFAULT_QUEUE_DEPTH;

#[derive(Debug, Clone, Parser)]
#[command(name = "jakarta-census", version)]
#[command(about = "Count javax/jakarta namespace references in compiled Java archives")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// More log output on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Worker threads for archive scanning.
    #[arg(long, value_name = "N", global = true)]
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Scan archives and write a usage report.
    Scan {
        /// Archive files or directories to search for archives.
        #[arg(required = true, value_name = "PATH")]
        inputs: Vec<PathBuf>,

        /// Repository root; report paths are written relative to it.
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Report file, or `-` for stdout.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[arg(long, value_name = "GLOB")]
        include: Vec<String>,

        #[arg(long, value_name = "GLOB")]
        exclude: Vec<String>,

        /// Rows buffered between scan workers and the report writer.
        #[arg(long, value_name = "N", default_value_t = DEFAULT_QUEUE_DEPTH)]
        queue: usize,

        /// Stop starting new archives after this many seconds.
        #[arg(long, value_name = "SECS")]
        time_limit: Option<u64>,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Summarize an existing report of any supported version.
    Read {
        report: PathBuf,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Record the references of every class as a dependency-graph file.
    Graph {
        #[arg(required = true, value_name = "PATH")]
        inputs: Vec<PathBuf>,

        /// Graph file; stdout when omitted.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[arg(long, value_name = "GLOB")]
        include: Vec<String>,

        #[arg(long, value_name = "GLOB")]
        exclude: Vec<String>,
    },
    /// Work out which namespace renames force other renames.
    Closure {
        #[arg(required = true, value_name = "GRAPH")]
        graphs: Vec<PathBuf>,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// List the tracked namespaces in classification order.
    Namespaces {
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
