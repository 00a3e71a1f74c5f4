//! Dry-run runner: logs what would run and reports success.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::{MlflowRunner, StageOutcome, StageRunner};
use crate::error::RunnerError;
use crate::pipeline::{RunContext, StageInvocation};

/// Runner that never launches anything.
pub struct DryRunRunner {
    preview: MlflowRunner,
}

impl DryRunRunner {
    /// Creates a dry-run runner that renders commands as `preview` would run them.
    pub fn new(preview: MlflowRunner) -> Self {
        Self { preview }
    }
}

#[async_trait]
impl StageRunner for DryRunRunner {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn run(
        &self,
        invocation: &StageInvocation,
        context: &RunContext,
    ) -> Result<StageOutcome, RunnerError> {
        info!(
            stage = %invocation.stage,
            project = %context.project,
            run_group = %context.run_group,
            command = %self.preview.render(invocation),
            "Dry run, not executing"
        );
        Ok(StageOutcome::new(None, Duration::ZERO))
    }
}
