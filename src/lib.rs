//! genre-pipeline: config-driven orchestrator for the genre classification
//! ML pipeline.
//!
//! Reads a YAML configuration, picks the stages named in
//! `main.execute_steps` and runs each one as an external MLflow project with
//! parameters taken from the configuration.

pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod runner;

pub use error::{ConfigError, DispatchError, RunnerError};
