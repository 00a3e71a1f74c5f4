//! Pipeline configuration loading.
//!
//! The configuration is a YAML tree with the sections `main`, `data` and
//! `random_forest_pipeline`. It is loaded from `<config_dir>/<config_name>.yaml`
//! and then patched with command-line overrides:
//!
//! ```text
//! genre-pipeline main.execute_steps=download,preprocess data.ks_alpha=0.01
//! ```
//!
//! Keys are looked up lazily: a stage only fails on a missing key when it is
//! selected. The stage selection and run context are read eagerly because every
//! run needs them.

mod overrides;
pub mod settings;

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::ConfigError;
use crate::pipeline::stage::value_kind;
use crate::pipeline::{ParamValue, RunContext, StageSelection};

pub use overrides::{Override, OverrideKind};
pub use settings::OrchestratorSettings;

/// Key holding the stage selection.
pub const EXECUTE_STEPS_KEY: &str = "main.execute_steps";

/// A loaded pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    tree: Value,
    selection: StageSelection,
    context: RunContext,
}

impl PipelineConfig {
    /// Builds a configuration from an already-merged tree.
    ///
    /// # Errors
    ///
    /// Fails if `main.project_name`, `main.experiment_name` or
    /// `main.execute_steps` is missing or malformed.
    pub fn from_tree(tree: Value) -> Result<Self, ConfigError> {
        let project = scalar_string(&tree, "main.project_name")?;
        let run_group = scalar_string(&tree, "main.experiment_name")?;
        let selection = selection_from_value(lookup_in(&tree, EXECUTE_STEPS_KEY)?)?;

        Ok(Self {
            tree,
            selection,
            context: RunContext::new(project, run_group),
        })
    }

    /// Parses a YAML document without overrides.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::from_tree(parse_document(yaml)?)
    }

    /// The normalized stage selection.
    pub fn selection(&self) -> &StageSelection {
        &self.selection
    }

    /// The tracking context for this run.
    pub fn run_context(&self) -> &RunContext {
        &self.context
    }

    /// Looks up a dotted key such as `data.ks_alpha`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingKey` naming the full key when any segment
    /// is absent.
    pub fn lookup(&self, key: &str) -> Result<&Value, ConfigError> {
        lookup_in(&self.tree, key)
    }

    /// Looks up a dotted key and converts it to a stage parameter.
    pub fn param(&self, key: &str) -> Result<ParamValue, ConfigError> {
        ParamValue::from_yaml(key, self.lookup(key)?)
    }

    /// Serializes the subtree under `key` as YAML.
    pub fn subtree_yaml(&self, key: &str) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self.lookup(key)?)?)
    }

    /// Serializes the whole resolved configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(&self.tree)?)
    }
}

/// Loads `<config_dir>/<config_name>.yaml` and applies overrides in order.
///
/// `config_name` may carry its own `.yaml`/`.yml` extension; without one,
/// `.yaml` is tried before `.yml`.
///
/// # Errors
///
/// Returns `ConfigError` if the file is missing or unparsable, if an override
/// is malformed or does not apply, or if the required `main` keys are absent.
pub fn load(
    config_dir: &Path,
    config_name: &str,
    overrides: &[String],
) -> Result<PipelineConfig, ConfigError> {
    let path = resolve_config_path(config_dir, config_name)?;
    debug!(path = %path.display(), "Loading pipeline config");

    let content = fs::read_to_string(&path)?;
    let mut tree = parse_document(&content)?;

    for raw in overrides {
        let parsed = Override::parse(raw)?;
        debug!(key = %parsed.key(), kind = ?parsed.kind(), "Applying override");
        parsed.apply(&mut tree)?;
    }

    PipelineConfig::from_tree(tree)
}

/// Finds the config file for `config_name` inside `config_dir`.
pub fn resolve_config_path(config_dir: &Path, config_name: &str) -> Result<PathBuf, ConfigError> {
    if config_name.ends_with(".yaml") || config_name.ends_with(".yml") {
        let path = config_dir.join(config_name);
        return if path.is_file() {
            Ok(path)
        } else {
            Err(ConfigError::NotFound(path.display().to_string()))
        };
    }

    let yaml = config_dir.join(format!("{}.yaml", config_name));
    if yaml.is_file() {
        return Ok(yaml);
    }
    let yml = config_dir.join(format!("{}.yml", config_name));
    if yml.is_file() {
        return Ok(yml);
    }
    Err(ConfigError::NotFound(yaml.display().to_string()))
}

/// Normalizes `main.execute_steps` into a selection.
///
/// A string is split on `,`; a list must contain only strings.
pub fn selection_from_value(value: &Value) -> Result<StageSelection, ConfigError> {
    match value {
        Value::String(raw) => Ok(StageSelection::parse(raw)),
        Value::Sequence(items) => {
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(name) => names.push(name.clone()),
                    other => {
                        return Err(ConfigError::InvalidSelection(format!(
                            "list entries must be strings, found {}",
                            value_kind(other)
                        )))
                    }
                }
            }
            Ok(StageSelection::new(names))
        }
        other => Err(ConfigError::InvalidSelection(format!(
            "expected a comma-separated string or a list of strings, found {}",
            value_kind(other)
        ))),
    }
}

fn parse_document(yaml: &str) -> Result<Value, ConfigError> {
    match serde_yaml::from_str::<Value>(yaml)? {
        Value::Null => Ok(Value::Mapping(Mapping::new())),
        tree @ Value::Mapping(_) => Ok(tree),
        other => Err(ConfigError::InvalidValue {
            key: "<root>".to_string(),
            message: format!("expected a mapping, found {}", value_kind(&other)),
        }),
    }
}

fn lookup_in<'a>(tree: &'a Value, key: &str) -> Result<&'a Value, ConfigError> {
    let mut node = tree;
    for segment in key.split('.') {
        let next = match node {
            Value::Mapping(map) => map.get(segment),
            Value::Sequence(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        node = next.ok_or_else(|| ConfigError::MissingKey(key.to_string()))?;
    }
    Ok(node)
}

fn scalar_string(tree: &Value, key: &str) -> Result<String, ConfigError> {
    match lookup_in(tree, key)? {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a string, found {}", value_kind(other)),
        }),
    }
}
