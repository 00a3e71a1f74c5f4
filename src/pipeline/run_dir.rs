//! Per-run working directories.
//!
//! Each run gets `<outputs_root>/<YYYY-MM-DD>/<HH-MM-SS>`, holding the derived
//! model config and a `.run/` snapshot of the resolved configuration.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::ConfigError;

/// Snapshot directory inside a run directory.
pub const SNAPSHOT_DIR: &str = ".run";

/// Returns the timestamped run directory for `now`.
pub fn job_dir<Tz: TimeZone>(outputs_root: &Path, now: &DateTime<Tz>) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    outputs_root
        .join(now.format("%Y-%m-%d").to_string())
        .join(now.format("%H-%M-%S").to_string())
}

/// Creates `run_dir` and saves the resolved config and overrides into it.
pub fn prepare(
    run_dir: &Path,
    config: &PipelineConfig,
    overrides: &[String],
) -> Result<(), ConfigError> {
    let snapshot = run_dir.join(SNAPSHOT_DIR);
    fs::create_dir_all(&snapshot)?;

    fs::write(snapshot.join("config.yaml"), config.to_yaml()?)?;
    fs::write(
        snapshot.join("overrides.yaml"),
        serde_yaml::to_string(overrides)?,
    )?;

    debug!(run_dir = %run_dir.display(), "Prepared run directory");
    Ok(())
}
