//! Stage dispatch for the genre classification pipeline.
//!
//! # Stages
//!
//! Six stages run in a fixed order, each as an independent project:
//!
//! ```text
//! download → preprocess → check_data → segregate → random_forest → evaluate
//! ```
//!
//! `main.execute_steps` picks a subset. Whatever order it lists them in, the
//! selected stages run in the order above, each exactly once. Stages share no
//! in-process data; they hand artifacts to each other through the external
//! artifact store (`raw_data.parquet:latest`, `genre_algo:latest`, ...).
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use genre_pipeline::config;
//! use genre_pipeline::pipeline::StageDispatcher;
//! use genre_pipeline::runner::MlflowRunner;
//!
//! let config = config::load(Path::new("."), "config", &overrides)?;
//! let dispatcher = StageDispatcher::new(Arc::new(MlflowRunner::new("mlflow")), root, run_dir);
//! let report = dispatcher.dispatch(&config).await?;
//! println!("ran {:?}", report.executed());
//! ```
//!
//! # Stage parameters
//!
//! Each stage's parameters come from [`table::STAGE_TABLE`]. Training also gets
//! `model_config`, the path of `random_forest_config.yml`, which is rewritten
//! from the `random_forest_pipeline` subtree right before the stage runs.

pub mod dispatcher;
pub mod run_dir;
pub mod stage;
pub mod table;

pub use dispatcher::{DispatchReport, StageDispatcher, StageRecord, DEFAULT_ENTRY_POINT};
pub use stage::{
    ParamValue, Parameters, RunContext, Stage, StageInvocation, StageSelection, PROJECT_ENV_VAR,
    RUN_GROUP_ENV_VAR,
};
pub use table::{MODEL_CONFIG_FILE, MODEL_CONFIG_KEY, STAGE_TABLE};
