//! Command-line interface components
//!
//! This module contains CLI-specific code for the forklet application,
//! including argument parsing, progress display and command handlers.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    Cli, Commands, DownloadArgs, FilterArgs, GlobalArgs, ListArgs, RefArgs, StrategyArg,
};
pub use commands::{handle_download, handle_list, handle_rate_limit};
pub use progress::{ProgressConfig, ProgressDisplay};
