//! CLI commands and argument parsing

use crate::config::LogFormat;
use crate::types::SourceKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Daily extraction of the API and MySQL sources into the warehouse
#[derive(Parser, Debug)]
#[command(name = "daily-extract")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline configuration file (YAML)
    #[arg(short = 'C', long, global = true, default_value = "daily_extract.yaml")]
    pub config: PathBuf,

    /// Output format of command results
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Log line format (overrides the configuration)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline
    Run {
        /// Run a single source
        #[arg(long)]
        only: Option<SourceKind>,
    },

    /// Print the API task plan without running it
    Plan,

    /// Print the monthly periods between two dates
    Periods {
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: String,
    },

    /// Open the tunnel and list the source tables
    Tables,

    /// Load and validate the configuration
    Validate,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
