//! Core stage types: stage names, selections, parameters and invocations.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::ConfigError;

/// Environment variable carrying the tracking project name.
pub const PROJECT_ENV_VAR: &str = "WANDB_PROJECT";

/// Environment variable carrying the run group for one orchestration run.
pub const RUN_GROUP_ENV_VAR: &str = "WANDB_RUN_GROUP";

/// The six pipeline stages, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Download,
    Preprocess,
    CheckData,
    Segregate,
    RandomForest,
    Evaluate,
}

impl Stage {
    /// All stages in dispatch order.
    pub const ALL: [Stage; 6] = [
        Stage::Download,
        Stage::Preprocess,
        Stage::CheckData,
        Stage::Segregate,
        Stage::RandomForest,
        Stage::Evaluate,
    ];

    /// Name used in `main.execute_steps` and as the stage directory name.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::Preprocess => "preprocess",
            Stage::CheckData => "check_data",
            Stage::Segregate => "segregate",
            Stage::RandomForest => "random_forest",
            Stage::Evaluate => "evaluate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    // Exact match only: selection names are not trimmed or case-folded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| format!("Unknown stage: {}", s))
    }
}

/// Normalized `main.execute_steps`: the ordered list of requested stage names.
///
/// Names that match no stage are kept so they can be reported, but never
/// select anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageSelection {
    names: Vec<String>,
}

impl StageSelection {
    /// Creates a selection from a list of names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses the comma-separated command-line form, e.g. `download,evaluate`.
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    /// Returns true if the stage was requested.
    pub fn contains(&self, stage: Stage) -> bool {
        self.names.iter().any(|name| name == stage.name())
    }

    /// Requested names, in the order given.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Selected stages in dispatch order.
    pub fn stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|stage| self.contains(*stage))
            .collect()
    }

    /// Non-empty names that match no stage.
    pub fn unrecognized(&self) -> Vec<&str> {
        self.names
            .iter()
            .map(String::as_str)
            .filter(|name| !name.is_empty() && name.parse::<Stage>().is_err())
            .collect()
    }
}

/// A single stage parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Path(PathBuf),
}

impl ParamValue {
    /// Converts a scalar configuration value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotScalar` for lists, mappings and tagged values.
    pub fn from_yaml(key: &str, value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Null => Ok(ParamValue::Null),
            Value::Bool(b) => Ok(ParamValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(ParamValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(ParamValue::Float(f))
                } else {
                    Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        message: format!("number {} is out of range", n),
                    })
                }
            }
            Value::String(s) => Ok(ParamValue::Str(s.clone())),
            other => Err(ConfigError::NotScalar {
                key: key.to_string(),
                found: value_kind(other).to_string(),
            }),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => write!(f, "null"),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            // Keep a decimal point on whole floats so `1.0` stays a float downstream.
            ParamValue::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            ParamValue::Float(x) => write!(f, "{}", x),
            ParamValue::Str(s) => write!(f, "{}", s),
            ParamValue::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<PathBuf> for ParamValue {
    fn from(value: PathBuf) -> Self {
        ParamValue::Path(value)
    }
}

/// Parameter mapping handed to one stage run.
pub type Parameters = BTreeMap<String, ParamValue>;

/// Tracking context shared by every stage run of one orchestration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunContext {
    /// Tracking project name (`main.project_name`).
    pub project: String,
    /// Run group all stage runs are filed under (`main.experiment_name`).
    pub run_group: String,
}

impl RunContext {
    /// Creates a run context.
    pub fn new(project: impl Into<String>, run_group: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            run_group: run_group.into(),
        }
    }

    /// Environment variables a runner must set on each stage process.
    pub fn env_vars(&self) -> [(&'static str, &str); 2] {
        [
            (PROJECT_ENV_VAR, self.project.as_str()),
            (RUN_GROUP_ENV_VAR, self.run_group.as_str()),
        ]
    }
}

/// Everything a runner needs to execute one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageInvocation {
    /// The stage being run.
    pub stage: Stage,
    /// Stage project directory.
    pub stage_dir: PathBuf,
    /// Entry point inside the stage project.
    pub entry_point: String,
    /// Stage parameters.
    pub parameters: Parameters,
}

/// Human-readable name of a YAML value's shape.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
