//! Stage runners.
//!
//! A runner executes one stage project given its directory, entry point and
//! parameters. The stage's real work happens outside this crate; the runner only
//! launches it and reports success or failure.
//!
//! ```text
//! StageDispatcher → StageRunner::run(invocation, context) → stage process
//! ```
//!
//! Implementations:
//! - [`MlflowRunner`]: `mlflow run <stage_dir> -e <entry> -P key=value ...`
//! - [`DryRunRunner`]: logs the command it would run and succeeds

pub mod dry_run;
pub mod mlflow;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RunnerError;
use crate::pipeline::{RunContext, StageInvocation};

pub use dry_run::DryRunRunner;
pub use mlflow::MlflowRunner;

/// Result of a successful stage run.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    /// Exit code of the stage process, when one was started.
    pub exit_code: Option<i32>,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl StageOutcome {
    /// Creates an outcome.
    pub fn new(exit_code: Option<i32>, duration: Duration) -> Self {
        Self {
            exit_code,
            duration,
        }
    }
}

/// Trait for stage runners.
#[async_trait]
pub trait StageRunner: Send + Sync {
    /// Short runner name for logs.
    fn name(&self) -> &'static str;

    /// Runs one stage to completion.
    ///
    /// The runner must expose `context` to the stage (see
    /// [`RunContext::env_vars`]). A stage that reports failure is an error.
    async fn run(
        &self,
        invocation: &StageInvocation,
        context: &RunContext,
    ) -> Result<StageOutcome, RunnerError>;
}
