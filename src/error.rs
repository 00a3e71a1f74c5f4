//! Error types for genre-pipeline operations.
//!
//! Defines error types for the three subsystems:
//! - Configuration loading, overrides and key lookup
//! - External stage runners
//! - Stage dispatch

use thiserror::Error;

/// Errors that can occur while loading or reading the pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Missing config key '{0}'")]
    MissingKey(String),

    #[error("Invalid override '{raw}': {reason}")]
    InvalidOverride { raw: String, reason: String },

    #[error("Could not override '{0}': key not found in config (use '+{0}=...' to add it)")]
    UnknownOverrideKey(String),

    #[error("Could not add '{0}': key already exists (use '++{0}=...' to replace it)")]
    KeyExists(String),

    #[error("Invalid main.execute_steps: {0}")]
    InvalidSelection(String),

    #[error("Config key '{key}' must be a scalar, found {found}")]
    NotScalar { key: String, found: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors reported by a stage runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stage '{stage}' exited with {status}")]
    StageFailed { stage: String, status: String },
}

/// Errors that abort a dispatch run.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Stage '{stage}' failed: {source}")]
    Runner {
        stage: String,
        #[source]
        source: RunnerError,
    },

    #[error("Failed to write model config '{path}': {source}")]
    ModelConfig {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
