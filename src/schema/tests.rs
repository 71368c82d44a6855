//! Schema validation tests

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn user_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["id", "name"],
        "properties": {
            "id": {"type": "integer", "minimum": 1},
            "name": {"type": "string"},
            "role": {"enum": ["admin", "member"]},
            "tags": {"type": "array", "items": {"type": "string"}}
        }
    })
}

#[test]
fn test_valid_payload() {
    let payload = json!({"id": 1, "name": "Ada", "role": "admin", "tags": ["x"]});
    let outcome = BasicSchemaValidator.validate(&payload, &user_schema());
    assert!(outcome.valid);
    assert!(outcome.diffs.is_empty());
}

#[test]
fn test_missing_required_and_wrong_type() {
    let payload = json!({"id": "one"});
    let outcome = BasicSchemaValidator.validate(&payload, &user_schema());
    assert!(!outcome.valid);
    assert_eq!(
        outcome.diffs,
        vec![
            SchemaDiff::new("$", "missing required property 'name'"),
            SchemaDiff::new("$.id", "expected integer, got string"),
        ]
    );
}

#[test]
fn test_nested_array_items() {
    let payload = json!({"id": 2, "name": "Bo", "tags": ["ok", 5]});
    let outcome = BasicSchemaValidator.validate(&payload, &user_schema());
    assert_eq!(
        outcome.diffs,
        vec![SchemaDiff::new("$.tags[1]", "expected string, got integer")]
    );
}

#[test]
fn test_enum_and_minimum() {
    let payload = json!({"id": 0, "name": "Cy", "role": "owner"});
    let outcome = BasicSchemaValidator.validate(&payload, &user_schema());
    assert_eq!(outcome.diffs.len(), 2);
    assert_eq!(outcome.diffs[0].path, "$.id");
    assert_eq!(outcome.diffs[1].path, "$.role");
}

#[test]
fn test_additional_properties_false() {
    let schema = json!({
        "type": "object",
        "properties": {"a": {"type": "number"}},
        "additionalProperties": false
    });
    let outcome = BasicSchemaValidator.validate(&json!({"a": 1.5, "b": 2}), &schema);
    assert_eq!(
        outcome.diffs,
        vec![SchemaDiff::new("$", "unexpected property 'b'")]
    );
}

#[test]
fn test_type_list_and_number_accepts_integer() {
    let schema = json!({"type": ["string", "null"]});
    assert!(BasicSchemaValidator.validate(&json!(null), &schema).valid);
    assert!(!BasicSchemaValidator.validate(&json!(3), &schema).valid);

    let schema = json!({"type": "number"});
    assert!(BasicSchemaValidator.validate(&json!(3), &schema).valid);
}

#[test]
fn test_json_type_of() {
    assert_eq!(JsonType::of(&json!(1)), JsonType::Integer);
    assert_eq!(JsonType::of(&json!(1.5)), JsonType::Number);
    assert_eq!(JsonType::of(&json!({})), JsonType::Object);
    assert!(JsonType::Integer.accepts(&json!(2.0)));
    assert!(!JsonType::Integer.accepts(&json!(2.5)));
}

#[test]
fn test_pretty_print_diffs() {
    let diffs = vec![
        SchemaDiff::new("$", "missing required property 'id'"),
        SchemaDiff::new("$.name", "expected string, got integer"),
    ];
    assert_eq!(
        pretty_print_diffs(&diffs),
        "  - $: missing required property 'id'\n  - $.name: expected string, got integer"
    );
}
