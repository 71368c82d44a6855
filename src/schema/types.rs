//! Schema types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON Schema type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl JsonType {
    /// Parse a schema `type` keyword
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(JsonType::String),
            "number" => Some(JsonType::Number),
            "integer" => Some(JsonType::Integer),
            "boolean" => Some(JsonType::Boolean),
            "object" => Some(JsonType::Object),
            "array" => Some(JsonType::Array),
            "null" => Some(JsonType::Null),
            _ => None,
        }
    }

    /// The most specific type of a value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => JsonType::Integer,
            Value::Number(_) => JsonType::Number,
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }

    /// Whether a value satisfies this type (integers are numbers too)
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, JsonType::of(value)) {
            (a, b) if *a == b => true,
            (JsonType::Number, JsonType::Integer) => true,
            (JsonType::Integer, JsonType::Number) => {
                value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for JsonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonType::String => write!(f, "string"),
            JsonType::Number => write!(f, "number"),
            JsonType::Integer => write!(f, "integer"),
            JsonType::Boolean => write!(f, "boolean"),
            JsonType::Object => write!(f, "object"),
            JsonType::Array => write!(f, "array"),
            JsonType::Null => write!(f, "null"),
        }
    }
}

/// One mismatch between a payload and its schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDiff {
    /// JSON pointer-ish location (`$.items[0].id`)
    pub path: String,
    /// What went wrong
    pub message: String,
}

impl SchemaDiff {
    /// Create a diff
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// No diffs were found
    pub valid: bool,
    /// Every mismatch found
    pub diffs: Vec<SchemaDiff>,
}

impl ValidationOutcome {
    /// Build an outcome from the collected diffs
    pub fn from_diffs(diffs: Vec<SchemaDiff>) -> Self {
        Self {
            valid: diffs.is_empty(),
            diffs,
        }
    }
}
