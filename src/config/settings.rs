//! Orchestrator process settings.
//!
//! These control how stages are launched, not what they do, so they live
//! outside the pipeline YAML and are read from the environment and CLI flags.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Environment managers accepted by `mlflow run --env-manager`.
pub const ENV_MANAGERS: [&str; 3] = ["local", "conda", "virtualenv"];

/// Settings for launching stage runs.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// MLflow executable used to run stage projects.
    pub mlflow_command: String,
    /// Environment manager passed to MLflow; `None` keeps MLflow's default.
    pub env_manager: Option<String>,
    /// Entry point invoked in every stage project.
    pub entry_point: String,
    /// Directory under which per-run working directories are created.
    pub outputs_root: PathBuf,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            mlflow_command: "mlflow".to_string(),
            env_manager: None,
            entry_point: "main".to_string(),
            outputs_root: PathBuf::from("outputs"),
        }
    }
}

impl OrchestratorSettings {
    /// Creates settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `GENRE_PIPELINE_MLFLOW_BIN`: MLflow executable (default: mlflow)
    /// - `GENRE_PIPELINE_ENV_MANAGER`: local, conda or virtualenv (default: unset)
    /// - `GENRE_PIPELINE_ENTRY_POINT`: stage entry point (default: main)
    /// - `GENRE_PIPELINE_OUTPUTS`: run directory root (default: outputs)
    ///
    /// The result is not validated, so command-line flags can still replace
    /// bad values. Call [`validate`](Self::validate) once they are applied.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(val) = lookup("GENRE_PIPELINE_MLFLOW_BIN") {
            settings.mlflow_command = val;
        }

        if let Some(val) = lookup("GENRE_PIPELINE_ENV_MANAGER") {
            if !val.is_empty() {
                settings.env_manager = Some(val);
            }
        }

        if let Some(val) = lookup("GENRE_PIPELINE_ENTRY_POINT") {
            settings.entry_point = val;
        }

        if let Some(val) = lookup("GENRE_PIPELINE_OUTPUTS") {
            settings.outputs_root = PathBuf::from(val);
        }

        settings
    }

    /// Validates the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mlflow_command.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "mlflow_command cannot be empty".to_string(),
            ));
        }

        if self.entry_point.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "entry_point cannot be empty".to_string(),
            ));
        }

        if self.outputs_root.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "outputs_root cannot be empty".to_string(),
            ));
        }

        if let Some(ref manager) = self.env_manager {
            if !ENV_MANAGERS.contains(&manager.as_str()) {
                return Err(ConfigError::ValidationFailed(format!(
                    "env_manager must be one of {}, got '{}'",
                    ENV_MANAGERS.join(", "),
                    manager
                )));
            }
        }

        Ok(())
    }

    /// Builder method to set the MLflow executable.
    pub fn with_mlflow_command(mut self, command: impl Into<String>) -> Self {
        self.mlflow_command = command.into();
        self
    }

    /// Builder method to set the environment manager.
    pub fn with_env_manager(mut self, manager: impl Into<String>) -> Self {
        self.env_manager = Some(manager.into());
        self
    }

    /// Builder method to set the entry point.
    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    /// Builder method to set the outputs root.
    pub fn with_outputs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.outputs_root = root.into();
        self
    }
}
