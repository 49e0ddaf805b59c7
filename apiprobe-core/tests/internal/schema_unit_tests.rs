use super::*;
use serde_json::json;

fn arena(definitions: JsonValue) -> SchemaArena {
    SchemaArena::new(definitions.as_object().expect("definitions object"))
}

#[test]
fn expand_inlines_references_with_fresh_copies() {
    let arena = arena(json!({
        "Name": {"type": "string", "minLength": 1}
    }));
    let schema = json!({
        "type": "object",
        "properties": {
            "first": {"$ref": "#/components/schemas/Name"},
            "last": {"$ref": "#/definitions/Name", "maxLength": 5}
        }
    });
    let expanded = arena.expand(&schema, 8).expect("expand");
    assert_eq!(
        expanded,
        json!({
            "type": "object",
            "properties": {
                "first": {"type": "string", "minLength": 1},
                "last": {"type": "string", "minLength": 1, "maxLength": 5}
            }
        })
    );
}

#[test]
fn expand_truncates_recursive_references_at_depth_limit() {
    let arena = arena(json!({
        "Node": {
            "type": "object",
            "properties": {"child": {"$ref": "#/definitions/Node"}}
        }
    }));
    let expanded = arena
        .expand(&json!({"$ref": "#/definitions/Node"}), 2)
        .expect("expand");
    assert_eq!(
        expanded,
        json!({
            "type": "object",
            "properties": {
                "child": {
                    "type": "object",
                    "properties": {"child": {}}
                }
            }
        })
    );
}

#[test]
fn expand_reports_unknown_and_malformed_references() {
    let arena = arena(json!({}));
    let error = arena
        .expand(&json!({"$ref": "#/definitions/Missing"}), 4)
        .expect_err("unknown");
    assert_eq!(
        error,
        ReferenceError::Unresolvable("#/definitions/Missing".to_string())
    );
    let error = arena.expand(&json!({"$ref": 7}), 4).expect_err("malformed");
    assert!(matches!(error, ReferenceError::Malformed(_)));
    assert!(arena.is_empty());
}

#[test]
fn expand_leaves_instance_data_untouched() {
    let arena = arena(json!({"Id": {"type": "integer"}}));
    let schema = json!({"example": {"$ref": "#/definitions/Id"}, "type": "object"});
    let expanded = arena.expand(&schema, 4).expect("expand");
    assert_eq!(expanded, schema);
}

#[test]
fn lookup_decodes_pointer_escapes() {
    let arena = arena(json!({"a/b": {"type": "null"}}));
    let id = arena.lookup("#/definitions/a~1b").expect("lookup");
    assert_eq!(arena.node(id), &json!({"type": "null"}));
    assert_eq!(arena.len(), 1);
}

#[test]
fn allowed_types_covers_unions_and_numbers() {
    let schema = json!({"anyOf": [{"type": "number"}, {"type": "null"}]});
    let types = allowed_types(schema.as_object().expect("object")).expect("types");
    assert!(types.contains("integer"));
    assert!(types.contains("null"));

    let untyped = json!({"anyOf": [{"type": "string"}, {"minimum": 1}]});
    assert!(allowed_types(untyped.as_object().expect("object")).is_none());
}

#[test]
fn inferred_type_uses_keywords() {
    let object = json!({"properties": {}});
    assert_eq!(inferred_type(object.as_object().expect("object")), Some("object"));
    let string = json!({"pattern": "a"});
    assert_eq!(inferred_type(string.as_object().expect("object")), Some("string"));
    let empty = json!({});
    assert_eq!(inferred_type(empty.as_object().expect("object")), None);
}

#[test]
fn merge_all_of_combines_properties_and_required() {
    let schema = json!({
        "allOf": [
            {"properties": {"a": {"type": "string"}}, "required": ["a"]},
            {"properties": {"b": {"type": "integer"}}, "required": ["b", "a"]}
        ]
    });
    let merged = merge_all_of(schema.as_object().expect("object"));
    assert_eq!(
        JsonValue::Object(merged),
        json!({
            "properties": {"a": {"type": "string"}, "b": {"type": "integer"}},
            "required": ["a", "b"]
        })
    );
}

#[test]
fn union_branches_split_type_arrays() {
    let schema = json!({"type": ["string", "null"], "minLength": 2});
    let branches = union_branches(schema.as_object().expect("object")).expect("branches");
    assert_eq!(branches.len(), 2);
    assert_eq!(branches[1].get("type"), Some(&json!("null")));
    assert_eq!(branches[0].get("minLength"), Some(&json!(2)));
}

#[test]
fn resolve_pointer_walks_objects_and_arrays() {
    let value = json!({"items": [{"id": 7}], "a~b": true});
    assert_eq!(resolve_pointer(&value, "/items/0/id"), Some(&json!(7)));
    assert_eq!(resolve_pointer(&value, "/a~0b"), Some(&json!(true)));
    assert_eq!(resolve_pointer(&value, ""), Some(&value));
    assert_eq!(resolve_pointer(&value, "/missing"), None);
    assert_eq!(resolve_pointer(&value, "items"), None);
}

#[test]
fn schema_check_accepts_and_rejects() {
    let check = SchemaCheck::new(&json!({"type": "integer", "minimum": 1}));
    assert!(check.accepts(&json!(1)));
    assert!(check.rejects(&json!(0)));
    assert!(check.rejects(&json!("1")));
}
