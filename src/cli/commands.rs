//! CLI definition and command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use tracing::info;

use crate::config::{self, OrchestratorSettings, PipelineConfig};
use crate::pipeline::{run_dir, DispatchReport, StageDispatcher};
use crate::runner::{DryRunRunner, MlflowRunner, StageRunner};

/// Default config file name (without extension).
const DEFAULT_CONFIG_NAME: &str = "config";

/// Run the genre classification pipeline stages selected in the config.
#[derive(Parser, Debug)]
#[command(name = "genre-pipeline")]
#[command(about = "Run the genre classification pipeline stages selected in the config")]
#[command(version)]
#[command(
    long_about = "genre-pipeline loads config.yaml, applies key=value overrides and runs the \
selected stages as MLflow projects.\n\nExample usage:\n  genre-pipeline main.execute_steps=download,preprocess\n  genre-pipeline main.execute_steps=[segregate,random_forest] data.test_size=0.2"
)]
pub struct Cli {
    /// Config overrides: key=value, +key=value, ++key=value or ~key.
    #[arg(value_name = "OVERRIDE")]
    pub overrides: Vec<String>,

    /// Directory containing the config file.
    #[arg(short = 'c', long, default_value = ".")]
    pub config_dir: PathBuf,

    /// Config file name, without extension.
    #[arg(short = 'n', long, default_value = DEFAULT_CONFIG_NAME)]
    pub config_name: String,

    /// Working directory for this run (default: outputs/<date>/<time>).
    #[arg(long)]
    pub run_dir: Option<PathBuf>,

    /// Log the stage commands instead of running them.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the resolved config and planned stage runs, then exit.
    #[arg(long)]
    pub cfg: bool,

    /// Print the run report as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,

    /// MLflow executable (overrides GENRE_PIPELINE_MLFLOW_BIN).
    #[arg(long)]
    pub mlflow_bin: Option<String>,

    /// MLflow environment manager: local, conda or virtualenv.
    #[arg(long)]
    pub env_manager: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to read the log level before running.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse CLI arguments and run.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run with already-parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let settings = resolve_settings(&cli, OrchestratorSettings::from_env())?;

    let root_dir = std::env::current_dir()?;
    let config_dir = root_dir.join(&cli.config_dir);
    let config = config::load(&config_dir, &cli.config_name, &cli.overrides)?;

    let work_dir = match cli.run_dir {
        Some(ref dir) => root_dir.join(dir),
        None => run_dir::job_dir(&root_dir.join(&settings.outputs_root), &Local::now()),
    };

    let preview = MlflowRunner::from_settings(&settings);

    if cli.cfg {
        let runner = Arc::new(DryRunRunner::new(preview.clone()));
        let dispatcher = StageDispatcher::new(runner, &root_dir, &work_dir)
            .with_entry_point(settings.entry_point.clone());
        print_config(&config, &dispatcher, &preview)?;
        return Ok(());
    }

    run_dir::prepare(&work_dir, &config, &cli.overrides)?;
    info!(run_dir = %work_dir.display(), "Run directory ready");

    let runner: Arc<dyn StageRunner> = if cli.dry_run {
        Arc::new(DryRunRunner::new(preview))
    } else {
        Arc::new(preview)
    };

    let dispatcher = StageDispatcher::new(runner, root_dir, work_dir)
        .with_entry_point(settings.entry_point.clone());
    let report = dispatcher.dispatch(&config).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

/// Applies CLI flags over `base`, then validates the result.
fn resolve_settings(
    cli: &Cli,
    base: OrchestratorSettings,
) -> anyhow::Result<OrchestratorSettings> {
    let mut settings = base;
    if let Some(ref bin) = cli.mlflow_bin {
        settings = settings.with_mlflow_command(bin.clone());
    }
    if let Some(ref manager) = cli.env_manager {
        settings = settings.with_env_manager(manager.clone());
    }
    settings.validate()?;
    Ok(settings)
}

fn print_config(
    config: &PipelineConfig,
    dispatcher: &StageDispatcher,
    preview: &MlflowRunner,
) -> anyhow::Result<()> {
    println!("{}", config.to_yaml()?);

    let plan = dispatcher.plan(config)?;
    if plan.is_empty() {
        println!("# no stages selected");
    }
    for invocation in &plan {
        println!("# {}: {}", invocation.stage, preview.render(invocation));
    }
    Ok(())
}

fn print_summary(report: &DispatchReport) {
    if report.stages.is_empty() {
        println!("No stages selected.");
        return;
    }
    println!(
        "Completed {} stage(s) for {} / {}:",
        report.stages.len(),
        report.project,
        report.run_group
    );
    for record in &report.stages {
        println!("  {:<14} {:>8} ms", record.stage.name(), record.duration_ms);
    }
}
