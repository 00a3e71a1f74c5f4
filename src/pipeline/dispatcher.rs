//! Stage dispatcher: runs the selected stages once each, in table order.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::DispatchError;
use crate::runner::StageRunner;

use super::stage::{Stage, StageInvocation};
use super::table::{
    BuildInputs, StageDefinition, MODEL_CONFIG_FILE, MODEL_CONFIG_KEY, STAGE_TABLE,
};

/// Default entry point of every stage project.
pub const DEFAULT_ENTRY_POINT: &str = "main";

/// One executed stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub stage_dir: PathBuf,
    /// Exit code reported by the runner; `None` when no process was started.
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

/// Summary of a dispatch run.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub run_id: String,
    pub project: String,
    pub run_group: String,
    pub stages: Vec<StageRecord>,
}

impl DispatchReport {
    /// Stages that ran, in order.
    pub fn executed(&self) -> Vec<Stage> {
        self.stages.iter().map(|record| record.stage).collect()
    }
}

/// Dispatches selected stages to a runner.
///
/// Stage directories are resolved against `root_dir`; the model configuration
/// file for training is written into `work_dir`.
pub struct StageDispatcher {
    runner: Arc<dyn StageRunner>,
    root_dir: PathBuf,
    work_dir: PathBuf,
    entry_point: String,
}

impl StageDispatcher {
    /// Creates a dispatcher.
    pub fn new(
        runner: Arc<dyn StageRunner>,
        root_dir: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            root_dir: root_dir.into(),
            work_dir: work_dir.into(),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
        }
    }

    /// Sets the entry point used for every stage.
    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    /// Path of the model configuration file written before training.
    pub fn model_config_path(&self) -> PathBuf {
        self.work_dir.join(MODEL_CONFIG_FILE)
    }

    /// Builds the invocations a dispatch would issue, without side effects.
    ///
    /// # Errors
    ///
    /// Fails on the first selected stage whose configuration keys are missing.
    pub fn plan(&self, config: &PipelineConfig) -> Result<Vec<StageInvocation>, DispatchError> {
        let model_config_path = self.model_config_path();
        let selection = config.selection();

        STAGE_TABLE
            .iter()
            .filter(|definition| selection.contains(definition.stage))
            .map(|definition| self.invocation(definition, config, &model_config_path))
            .collect()
    }

    /// Runs every selected stage in table order.
    ///
    /// The first failure (missing key, model config write, runner error) stops
    /// the run; later stages are not attempted.
    pub async fn dispatch(&self, config: &PipelineConfig) -> Result<DispatchReport, DispatchError> {
        let run_id = format!("run-{}", Uuid::new_v4());
        let context = config.run_context();
        let selection = config.selection();
        let model_config_path = self.model_config_path();

        info!(
            run_id = %run_id,
            project = %context.project,
            run_group = %context.run_group,
            runner = self.runner.name(),
            steps = ?selection.names(),
            "Starting pipeline"
        );
        for name in selection.unrecognized() {
            warn!(step = name, "Ignoring unknown step in main.execute_steps");
        }

        let mut report = DispatchReport {
            run_id,
            project: context.project.clone(),
            run_group: context.run_group.clone(),
            stages: Vec::new(),
        };

        for definition in STAGE_TABLE.iter() {
            if !selection.contains(definition.stage) {
                continue;
            }

            if definition.writes_model_config {
                write_model_config(config, &model_config_path)?;
            }
            let invocation = self.invocation(definition, config, &model_config_path)?;

            let outcome = self
                .runner
                .run(&invocation, context)
                .await
                .map_err(|source| DispatchError::Runner {
                    stage: definition.stage.to_string(),
                    source,
                })?;

            info!(
                stage = %definition.stage,
                exit_code = ?outcome.exit_code,
                elapsed = ?outcome.duration,
                "Stage completed"
            );
            report.stages.push(StageRecord {
                stage: definition.stage,
                stage_dir: invocation.stage_dir,
                exit_code: outcome.exit_code,
                duration_ms: outcome.duration.as_millis() as u64,
            });
        }

        info!(
            run_id = %report.run_id,
            stages = report.stages.len(),
            "Pipeline finished"
        );
        Ok(report)
    }

    fn invocation(
        &self,
        definition: &StageDefinition,
        config: &PipelineConfig,
        model_config_path: &Path,
    ) -> Result<StageInvocation, DispatchError> {
        let inputs = BuildInputs {
            config,
            model_config_path,
        };
        Ok(StageInvocation {
            stage: definition.stage,
            stage_dir: self.root_dir.join(definition.stage.name()),
            entry_point: self.entry_point.clone(),
            parameters: (definition.build)(&inputs)?,
        })
    }
}

/// Serializes the model configuration subtree to `path`, replacing any old file.
fn write_model_config(config: &PipelineConfig, path: &Path) -> Result<(), DispatchError> {
    let yaml = config.subtree_yaml(MODEL_CONFIG_KEY)?;
    fs::write(path, yaml).map_err(|source| DispatchError::ModelConfig {
        path: path.display().to_string(),
        source,
    })?;
    info!(path = %path.display(), "Wrote model config");
    Ok(())
}
