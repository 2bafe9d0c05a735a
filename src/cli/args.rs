//! Command-line argument parsing for forklet
//!
//! This module defines the CLI structure using clap derive macros: a
//! filtered download command, a dry-run listing command and a rate limit
//! query.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::app::{DownloadStrategy, FilterCriteria};

/// forklet - Download selected files from GitHub repositories
#[derive(Parser, Debug)]
#[command(
    name = "forklet",
    version,
    about = "Download a filtered subset of a GitHub repository",
    long_about = "Downloads the files of a GitHub repository at a branch, tag or commit that match
glob, extension and size filters. Transfers run concurrently; press Ctrl-C to stop
starting new files and keep what has already been written."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// GitHub token (overrides GITHUB_TOKEN)
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download files from a repository
    Download(DownloadArgs),

    /// List the files a download would select, without downloading
    List(ListArgs),

    /// Show the remaining GitHub API quota
    RateLimit,
}

/// Which point in history to read from
#[derive(Args, Debug, Clone, Default)]
pub struct RefArgs {
    /// Branch, tag or commit SHA (default: the repository's default branch)
    #[arg(short = 'r', long = "ref", value_name = "REF")]
    pub reference: Option<String>,

    /// Exact commit SHA
    #[arg(long, value_name = "SHA", conflicts_with = "reference")]
    pub sha: Option<String>,
}

/// File selection options
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Glob a file must match (repeatable)
    #[arg(short, long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Glob that excludes a file (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Allowed extension (repeatable, e.g. "rs" or ".rs")
    #[arg(short, long = "ext", value_name = "EXT")]
    pub ext: Vec<String>,

    /// Denied extension (repeatable)
    #[arg(long = "exclude-ext", value_name = "EXT")]
    pub exclude_ext: Vec<String>,

    /// Minimum file size in bytes
    #[arg(long, value_name = "BYTES")]
    pub min_size: Option<u64>,

    /// Maximum file size in bytes
    #[arg(long, value_name = "BYTES")]
    pub max_size: Option<u64>,

    /// Include hidden files and directories
    #[arg(long)]
    pub hidden: bool,

    /// Exclude binary files by extension
    #[arg(long)]
    pub no_binary: bool,

    /// Only files under this path prefix (repeatable)
    #[arg(short, long = "path", value_name = "PREFIX")]
    pub path: Vec<String>,
}

/// Transfer strategy names accepted on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyArg {
    Archive,
    #[default]
    Individual,
    GitClone,
    SparseCheckout,
}

impl From<StrategyArg> for DownloadStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Archive => DownloadStrategy::Archive,
            StrategyArg::Individual => DownloadStrategy::Individual,
            StrategyArg::GitClone => DownloadStrategy::GitClone,
            StrategyArg::SparseCheckout => DownloadStrategy::SparseCheckout,
        }
    }
}

/// Arguments for the download command
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Repository as OWNER/NAME
    #[arg(value_name = "OWNER/REPO")]
    pub repository: String,

    /// Destination directory (default: the repository name)
    #[arg(value_name = "DEST")]
    pub destination: Option<PathBuf>,

    #[command(flatten)]
    pub reference: RefArgs,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Number of concurrent transfers (default from configuration)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Overwrite files that already exist
    #[arg(short, long)]
    pub force: bool,

    /// Write every file directly into the destination
    #[arg(long)]
    pub flatten: bool,

    /// Fail instead of creating a missing destination
    #[arg(long)]
    pub no_create: bool,

    /// Show what would be downloaded without downloading
    #[arg(long)]
    pub dry_run: bool,

    /// Per-file timeout, e.g. "30s" or "5m"
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Transfer strategy
    #[arg(long, value_enum, default_value_t = StrategyArg::Individual)]
    pub strategy: StrategyArg,
}

/// Arguments for the list command
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Repository as OWNER/NAME
    #[arg(value_name = "OWNER/REPO")]
    pub repository: String,

    #[command(flatten)]
    pub reference: RefArgs,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Show sizes next to paths
    #[arg(short, long)]
    pub long: bool,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        self.global.log_level()
    }
}

impl GlobalArgs {
    /// Level derived from `-q`, `-v` and `--very-verbose`
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.very_verbose {
            tracing::Level::DEBUG
        } else if self.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

impl FilterArgs {
    /// Check the size bounds
    pub fn validate(&self) -> Result<(), String> {
        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            if min > max {
                return Err(format!(
                    "--min-size ({}) cannot be larger than --max-size ({})",
                    min, max
                ));
            }
        }
        Ok(())
    }

    /// Build filter criteria from the flags
    pub fn to_criteria(&self) -> FilterCriteria {
        FilterCriteria::default()
            .with_include_patterns(self.include.iter().cloned())
            .with_exclude_patterns(self.exclude.iter().cloned())
            .with_allowed_extensions(self.ext.iter().cloned())
            .with_denied_extensions(self.exclude_ext.iter().cloned())
            .with_size_range(self.min_size, self.max_size)
            .with_hidden(self.hidden)
            .with_binary(!self.no_binary)
            .with_target_paths(self.path.iter().cloned())
    }
}

impl DownloadArgs {
    /// Validate argument combinations clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == Some(0) {
            return Err("Number of workers must be greater than 0".to_string());
        }

        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err("Timeout must be greater than 0".to_string());
        }

        self.filters.validate()
    }
}
