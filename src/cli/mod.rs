//! Command-line interface for genre-pipeline.
//!
//! Loads the pipeline configuration, applies overrides and dispatches the
//! selected stages.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli};
