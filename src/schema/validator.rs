//! Payload validation against JSON-Schema-like documents
//!
//! Covers the keywords endpoint configs use: `type`, `required`,
//! `properties`, `additionalProperties: false`, `items`, `enum`,
//! `minimum` and `maximum`. Unknown keywords are ignored.

use super::types::{JsonType, SchemaDiff, ValidationOutcome};
use serde_json::Value;

/// Checks payloads against a schema
pub trait SchemaValidator: Send + Sync + std::fmt::Debug {
    /// Validate a payload, collecting every mismatch
    fn validate(&self, payload: &Value, schema: &Value) -> ValidationOutcome;
}

/// Built-in validator for the common JSON Schema subset
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicSchemaValidator;

impl SchemaValidator for BasicSchemaValidator {
    fn validate(&self, payload: &Value, schema: &Value) -> ValidationOutcome {
        let mut diffs = Vec::new();
        check(payload, schema, "$", &mut diffs);
        ValidationOutcome::from_diffs(diffs)
    }
}

fn check(value: &Value, schema: &Value, path: &str, diffs: &mut Vec<SchemaDiff>) {
    let Some(schema) = schema.as_object() else {
        return;
    };

    if let Some(expected) = schema.get("type") {
        let types: Vec<JsonType> = match expected {
            Value::String(name) => JsonType::from_name(name).into_iter().collect(),
            Value::Array(names) => names
                .iter()
                .filter_map(Value::as_str)
                .filter_map(JsonType::from_name)
                .collect(),
            _ => Vec::new(),
        };
        if !types.is_empty() && !types.iter().any(|t| t.accepts(value)) {
            let names: Vec<String> = types.iter().map(ToString::to_string).collect();
            diffs.push(SchemaDiff::new(
                path,
                format!("expected {}, got {}", names.join(" or "), JsonType::of(value)),
            ));
            return;
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            let allowed = Value::Array(allowed.clone());
            diffs.push(SchemaDiff::new(path, format!("{value} is not one of {allowed}")));
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
            if n < min {
                diffs.push(SchemaDiff::new(path, format!("{n} is less than minimum {min}")));
            }
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
            if n > max {
                diffs.push(SchemaDiff::new(path, format!("{n} is greater than maximum {max}")));
            }
        }
    }

    match value {
        Value::Object(map) => {
            if let Some(required) = schema.get("required").and_then(Value::as_array) {
                for key in required.iter().filter_map(Value::as_str) {
                    if !map.contains_key(key) {
                        let message = format!("missing required property '{key}'");
                        diffs.push(SchemaDiff::new(path, message));
                    }
                }
            }

            let properties = schema.get("properties").and_then(Value::as_object);
            if let Some(properties) = properties {
                for (key, sub_schema) in properties {
                    if let Some(sub_value) = map.get(key) {
                        check(sub_value, sub_schema, &format!("{path}.{key}"), diffs);
                    }
                }
            }

            if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
                for key in map.keys() {
                    if !properties.is_some_and(|p| p.contains_key(key)) {
                        diffs.push(SchemaDiff::new(path, format!("unexpected property '{key}'")));
                    }
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    check(item, item_schema, &format!("{path}[{i}]"), diffs);
                }
            }
        }
        _ => {}
    }
}

/// Render diffs one per line for logs
pub fn pretty_print_diffs(diffs: &[SchemaDiff]) -> String {
    diffs
        .iter()
        .map(|d| format!("  - {}: {}", d.path, d.message))
        .collect::<Vec<_>>()
        .join("\n")
}
