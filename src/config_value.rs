//! Closed value model for merged `compilerOptions`.
//!
//! tsconfig option values are arbitrary JSON, but downstream code only ever
//! needs to distinguish a handful of shapes. Converting once at load time lets
//! the synthesizer and the compatibility analysis match exhaustively instead of
//! probing `serde_json::Value` fields.

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

pub type OptionMap = IndexMap<String, ConfigValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<ConfigValue>),
    Object(OptionMap),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// Boolean view that also accepts `"true"`/`"false"` strings, which tsc
    /// tolerates in hand-written configs.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(value) => Some(*value),
            ConfigValue::String(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&OptionMap> {
        match self {
            ConfigValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// String items of an array value; non-string items are skipped.
    pub fn string_items(&self) -> Vec<String> {
        self.as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::Null => Value::Null,
            ConfigValue::Bool(value) => Value::Bool(*value),
            ConfigValue::Number(value) => number_to_json(*value),
            ConfigValue::String(value) => Value::String(value.clone()),
            ConfigValue::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            ConfigValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

fn number_to_json(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::Number(Number::from(value as i64))
    } else {
        Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl From<&Value> for ConfigValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(value) => ConfigValue::Bool(*value),
            Value::Number(number) => ConfigValue::Number(number.as_f64().unwrap_or(0.0)),
            Value::String(value) => ConfigValue::String(value.clone()),
            Value::Array(items) => ConfigValue::Array(items.iter().map(ConfigValue::from).collect()),
            Value::Object(map) => ConfigValue::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), ConfigValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(values: Vec<String>) -> Self {
        ConfigValue::Array(values.into_iter().map(ConfigValue::String).collect())
    }
}

/// Lowercase an enum-like option value and drop separators, so `"Node16"`,
/// `"node-16"` and `"NODE16"` compare equal.
pub fn normalize_option(value: &str) -> String {
    let mut normalized = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == '-' || ch == '_' || ch.is_whitespace() {
            continue;
        }
        normalized.push(ch.to_ascii_lowercase());
    }
    normalized
}
