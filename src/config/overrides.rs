//! Command-line overrides for the pipeline configuration.
//!
//! Supported forms:
//!
//! | form | effect |
//! |---|---|
//! | `key.path=value` | replace an existing key |
//! | `+key.path=value` | add a key that does not exist yet |
//! | `++key.path=value` | set a key, adding or replacing |
//! | `~key.path` | delete an existing key |
//!
//! Values are read as YAML, so `0.1` is a float, `[a,b]` a list and
//! `download,evaluate` a plain string. An empty value is the empty string.

use serde_yaml::{Mapping, Value};

use crate::error::ConfigError;

/// How an override changes the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    Set,
    Add,
    ForceSet,
    Delete,
}

/// One parsed `key=value` override.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    kind: OverrideKind,
    path: Vec<String>,
    value: Option<Value>,
}

impl Override {
    /// Parses a raw override argument.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidOverride` for a missing `=`, an empty key
    /// or key segment, or a value on a delete.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidOverride {
            raw: raw.to_string(),
            reason: reason.to_string(),
        };

        if let Some(key) = raw.strip_prefix('~') {
            if key.contains('=') {
                return Err(invalid("a delete override takes no value"));
            }
            return Ok(Self {
                kind: OverrideKind::Delete,
                path: split_key(key).ok_or_else(|| invalid("empty key segment"))?,
                value: None,
            });
        }

        let (kind, rest) = if let Some(rest) = raw.strip_prefix("++") {
            (OverrideKind::ForceSet, rest)
        } else if let Some(rest) = raw.strip_prefix('+') {
            (OverrideKind::Add, rest)
        } else {
            (OverrideKind::Set, raw)
        };

        let (key, value) = rest
            .split_once('=')
            .ok_or_else(|| invalid("expected 'key=value'"))?;

        Ok(Self {
            kind,
            path: split_key(key).ok_or_else(|| invalid("empty key segment"))?,
            value: Some(parse_value(value)),
        })
    }

    /// The override kind.
    pub fn kind(&self) -> OverrideKind {
        self.kind
    }

    /// The dotted key this override targets.
    pub fn key(&self) -> String {
        self.path.join(".")
    }

    /// The parsed value, absent for deletes.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Applies the override to a configuration tree.
    ///
    /// `+` and `++` create missing intermediate mappings; `=` and `~` require
    /// the full key to exist.
    pub fn apply(&self, tree: &mut Value) -> Result<(), ConfigError> {
        if tree.is_null() {
            *tree = Value::Mapping(Mapping::new());
        }

        let creates_parents = matches!(self.kind, OverrideKind::Add | OverrideKind::ForceSet);
        let Some((last, parents)) = self.path.split_last() else {
            return Err(ConfigError::UnknownOverrideKey(self.key()));
        };

        let mut node = tree;
        for segment in parents {
            let map = self.as_mapping(node, segment)?;
            if !map.contains_key(segment.as_str()) {
                if !creates_parents {
                    return Err(ConfigError::UnknownOverrideKey(self.key()));
                }
                map.insert(
                    Value::String(segment.clone()),
                    Value::Mapping(Mapping::new()),
                );
            }
            node = map
                .get_mut(segment.as_str())
                .ok_or_else(|| ConfigError::UnknownOverrideKey(self.key()))?;
        }

        let map = self.as_mapping(node, last)?;
        let exists = map.contains_key(last.as_str());

        match (self.kind, &self.value) {
            (OverrideKind::Delete, _) => {
                if map.remove(last.as_str()).is_none() {
                    return Err(ConfigError::UnknownOverrideKey(self.key()));
                }
            }
            (OverrideKind::Set, Some(value)) => {
                if !exists {
                    return Err(ConfigError::UnknownOverrideKey(self.key()));
                }
                map.insert(Value::String(last.clone()), value.clone());
            }
            (OverrideKind::Add, Some(value)) => {
                if exists {
                    return Err(ConfigError::KeyExists(self.key()));
                }
                map.insert(Value::String(last.clone()), value.clone());
            }
            (OverrideKind::ForceSet, Some(value)) => {
                map.insert(Value::String(last.clone()), value.clone());
            }
            (_, None) => {
                return Err(ConfigError::InvalidOverride {
                    raw: self.key(),
                    reason: "missing value".to_string(),
                })
            }
        }
        Ok(())
    }

    fn as_mapping<'a>(
        &self,
        node: &'a mut Value,
        segment: &str,
    ) -> Result<&'a mut Mapping, ConfigError> {
        match node {
            Value::Mapping(map) => Ok(map),
            _ => Err(ConfigError::InvalidOverride {
                raw: self.key(),
                reason: format!("cannot descend into '{}': parent is not a mapping", segment),
            }),
        }
    }
}

fn split_key(key: &str) -> Option<Vec<String>> {
    let segments: Vec<String> = key.split('.').map(str::to_string).collect();
    if segments.iter().any(String::is_empty) {
        None
    } else {
        Some(segments)
    }
}

fn parse_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }
    serde_yaml::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
