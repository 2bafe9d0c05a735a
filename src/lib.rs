//! forklet library
//!
//! Downloads a filtered subset of the files in a GitHub repository at a
//! branch, tag or commit, with bounded concurrency, per-file failure
//! isolation, live progress and cooperative pause, resume and cancellation.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
