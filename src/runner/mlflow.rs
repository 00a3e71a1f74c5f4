//! MLflow project runner.
//!
//! Runs each stage as `mlflow run <stage_dir> -e <entry> -P key=value ...` and
//! waits for it. The tracking context is set on the child process only.

use std::ffi::OsString;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::{StageOutcome, StageRunner};
use crate::config::OrchestratorSettings;
use crate::error::RunnerError;
use crate::pipeline::{RunContext, StageInvocation};

/// Runner that launches stages through the MLflow CLI.
#[derive(Debug, Clone)]
pub struct MlflowRunner {
    /// Executable to run.
    command: String,
    /// Arguments placed before `run`.
    args: Vec<String>,
    /// Value for `--env-manager`, if any.
    env_manager: Option<String>,
}

impl MlflowRunner {
    /// Creates a runner for the given executable.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env_manager: None,
        }
    }

    /// Creates a runner from orchestrator settings.
    pub fn from_settings(settings: &OrchestratorSettings) -> Self {
        let runner = Self::new(settings.mlflow_command.clone());
        match settings.env_manager {
            Some(ref manager) => runner.with_env_manager(manager.clone()),
            None => runner,
        }
    }

    /// Adds arguments placed before the `run` subcommand.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Sets the `--env-manager` value.
    pub fn with_env_manager(mut self, manager: impl Into<String>) -> Self {
        self.env_manager = Some(manager.into());
        self
    }

    /// The executable this runner launches.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Builds the argument list for one invocation.
    pub fn command_args(&self, invocation: &StageInvocation) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        args.push("run".into());
        args.push(invocation.stage_dir.clone().into_os_string());
        args.push("-e".into());
        args.push(invocation.entry_point.clone().into());
        if let Some(ref manager) = self.env_manager {
            args.push("--env-manager".into());
            args.push(manager.into());
        }
        for (name, value) in &invocation.parameters {
            args.push("-P".into());
            args.push(format!("{}={}", name, value).into());
        }
        args
    }

    /// Renders the full command line for logs.
    pub fn render(&self, invocation: &StageInvocation) -> String {
        let mut line = self.command.clone();
        for arg in self.command_args(invocation) {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

#[async_trait]
impl StageRunner for MlflowRunner {
    fn name(&self) -> &'static str {
        "mlflow"
    }

    async fn run(
        &self,
        invocation: &StageInvocation,
        context: &RunContext,
    ) -> Result<StageOutcome, RunnerError> {
        let start = Instant::now();

        let mut cmd = Command::new(&self.command);
        cmd.args(self.command_args(invocation));
        cmd.envs(context.env_vars());
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        info!(
            stage = %invocation.stage,
            dir = %invocation.stage_dir.display(),
            "Starting mlflow run"
        );
        debug!(command = %self.render(invocation), "mlflow command line");

        let status = cmd.status().await.map_err(|source| RunnerError::Spawn {
            command: self.command.clone(),
            source,
        })?;

        if !status.success() {
            return Err(RunnerError::StageFailed {
                stage: invocation.stage.to_string(),
                status: status.to_string(),
            });
        }

        Ok(StageOutcome::new(status.code(), start.elapsed()))
    }
}
