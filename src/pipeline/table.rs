//! The stage table: which parameters each stage receives.
//!
//! Artifact references (`name:tag`) are passed through to the stages untouched.

use std::path::Path;

use crate::config::PipelineConfig;
use crate::error::ConfigError;

use super::stage::{ParamValue, Parameters, Stage};

/// File name of the serialized model configuration for the training stage.
pub const MODEL_CONFIG_FILE: &str = "random_forest_config.yml";

/// Config subtree serialized into [`MODEL_CONFIG_FILE`].
pub const MODEL_CONFIG_KEY: &str = "random_forest_pipeline";

/// Inputs available to a parameter builder.
pub struct BuildInputs<'a> {
    pub config: &'a PipelineConfig,
    /// Where the model configuration file is (or will be) written.
    pub model_config_path: &'a Path,
}

/// Parameter builder for one stage.
pub type ParameterBuilder = fn(&BuildInputs<'_>) -> Result<Parameters, ConfigError>;

/// One row of the stage table.
pub struct StageDefinition {
    pub stage: Stage,
    /// Whether the model configuration file is written before the stage runs.
    pub writes_model_config: bool,
    pub build: ParameterBuilder,
}

/// All stages in dispatch order.
pub static STAGE_TABLE: [StageDefinition; 6] = [
    StageDefinition {
        stage: Stage::Download,
        writes_model_config: false,
        build: download_params,
    },
    StageDefinition {
        stage: Stage::Preprocess,
        writes_model_config: false,
        build: preprocess_params,
    },
    StageDefinition {
        stage: Stage::CheckData,
        writes_model_config: false,
        build: check_data_params,
    },
    StageDefinition {
        stage: Stage::Segregate,
        writes_model_config: false,
        build: segregate_params,
    },
    StageDefinition {
        stage: Stage::RandomForest,
        writes_model_config: true,
        build: random_forest_params,
    },
    StageDefinition {
        stage: Stage::Evaluate,
        writes_model_config: false,
        build: evaluate_params,
    },
];

/// Looks up the table row for a stage.
pub fn definition(stage: Stage) -> &'static StageDefinition {
    // STAGE_TABLE is indexed in Stage::ALL order.
    &STAGE_TABLE[stage as usize]
}

fn params<const N: usize>(entries: [(&str, ParamValue); N]) -> Parameters {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn download_params(inputs: &BuildInputs<'_>) -> Result<Parameters, ConfigError> {
    Ok(params([
        ("file_url", inputs.config.param("data.file_url")?),
        ("artifact_name", "raw_data.parquet".into()),
        ("artifact_type", "raw_data".into()),
        ("artifact_description", "Data as downloaded".into()),
    ]))
}

fn preprocess_params(_inputs: &BuildInputs<'_>) -> Result<Parameters, ConfigError> {
    Ok(params([
        ("input_artifact", "raw_data.parquet:latest".into()),
        ("artifact_name", "processed_data.csv".into()),
        ("artifact_type", "preprocessed_data".into()),
        ("artifact_description", "Preprocess of data".into()),
    ]))
}

fn check_data_params(inputs: &BuildInputs<'_>) -> Result<Parameters, ConfigError> {
    Ok(params([
        ("reference_artifact", "processed_data.csv:latest".into()),
        ("sample_artifact", "processed_data.csv:latest".into()),
        ("ks_alpha", inputs.config.param("data.ks_alpha")?),
    ]))
}

fn segregate_params(inputs: &BuildInputs<'_>) -> Result<Parameters, ConfigError> {
    let config = inputs.config;
    Ok(params([
        ("input_artifact", "processed_data.csv:latest".into()),
        ("artifact_root", "genre_data".into()),
        ("artifact_type", "train-test_data".into()),
        ("test_size", config.param("data.test_size")?),
        ("random_state", config.param("main.random_seed")?),
        ("stratify", config.param("data.stratify")?),
    ]))
}

fn random_forest_params(inputs: &BuildInputs<'_>) -> Result<Parameters, ConfigError> {
    let config = inputs.config;
    Ok(params([
        ("train_data", "genre_data_train.csv:latest".into()),
        (
            "model_config",
            ParamValue::Path(inputs.model_config_path.to_path_buf()),
        ),
        ("export_artifact", "genre_algo".into()),
        (
            "random_seed",
            config.param("random_forest_pipeline.random_forest.random_state")?,
        ),
        ("val_size", config.param("data.val_size")?),
        ("stratify", config.param("data.stratify")?),
    ]))
}

fn evaluate_params(_inputs: &BuildInputs<'_>) -> Result<Parameters, ConfigError> {
    Ok(params([
        ("model_export", "genre_algo:latest".into()),
        ("test_data", "genre_data_test.csv:latest".into()),
    ]))
}
