//! Tagged value tree used for overlay composition.
//!
//! Descriptors are lowered into a [`ConfigValue`] tree, merged, and lifted
//! back. The tree only knows three shapes (scalar, sequence, mapping) so the
//! merge rules cannot drift with whatever a generic object merge would do.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ConfigValue {
    Scalar(Scalar),
    Sequence(Vec<ConfigValue>),
    Mapping(IndexMap<String, ConfigValue>),
}

impl ConfigValue {
    /// An empty mapping; merging it is the identity.
    pub fn empty() -> Self {
        ConfigValue::Mapping(IndexMap::new())
    }

    pub fn null() -> Self {
        ConfigValue::Scalar(Scalar::Null)
    }

    pub fn string(value: impl Into<String>) -> Self {
        ConfigValue::Scalar(Scalar::String(value.into()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ConfigValue::Scalar(Scalar::Null) => "null",
            ConfigValue::Scalar(_) => "scalar",
            ConfigValue::Sequence(_) => "sequence",
            ConfigValue::Mapping(_) => "mapping",
        }
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, ConfigValue::Mapping(_))
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, ConfigValue>> {
        match self {
            ConfigValue::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Look up a dotted path such as `output.publicPathTemplate`.
    pub fn pointer(&self, path: &str) -> Option<&ConfigValue> {
        path.split('.').try_fold(self, |node, key| match node {
            ConfigValue::Mapping(map) => map.get(key),
            _ => None,
        })
    }
}

impl Default for ConfigValue {
    fn default() -> Self {
        ConfigValue::empty()
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ConfigValue::Scalar(Scalar::Null),
            Value::Bool(b) => ConfigValue::Scalar(Scalar::Bool(b)),
            Value::Number(n) => ConfigValue::Scalar(Scalar::Number(n)),
            Value::String(s) => ConfigValue::Scalar(Scalar::String(s)),
            Value::Array(items) => {
                ConfigValue::Sequence(items.into_iter().map(ConfigValue::from).collect())
            }
            Value::Object(map) => ConfigValue::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, ConfigValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<ConfigValue> for Value {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Scalar(Scalar::Null) => Value::Null,
            ConfigValue::Scalar(Scalar::Bool(b)) => Value::Bool(b),
            ConfigValue::Scalar(Scalar::Number(n)) => Value::Number(n),
            ConfigValue::Scalar(Scalar::String(s)) => Value::String(s),
            ConfigValue::Sequence(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            ConfigValue::Mapping(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Merge `overlay` on top of `base` without touching either input.
///
/// - sequence + sequence: base items, then overlay items (no dedupe)
/// - mapping + mapping: key-wise recursion; base-only keys kept in place,
///   overlay-only keys appended
/// - anything else: the overlay value wins, including an explicit null
pub fn merge_values(base: &ConfigValue, overlay: &ConfigValue) -> ConfigValue {
    match (base, overlay) {
        (ConfigValue::Sequence(base_items), ConfigValue::Sequence(overlay_items)) => {
            ConfigValue::Sequence(base_items.iter().chain(overlay_items).cloned().collect())
        }
        (ConfigValue::Mapping(base_map), ConfigValue::Mapping(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, overlay_value) in overlay_map {
                let next = match base_map.get(key) {
                    Some(base_value) => merge_values(base_value, overlay_value),
                    None => overlay_value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            ConfigValue::Mapping(merged)
        }
        (_, replacement) => replacement.clone(),
    }
}
