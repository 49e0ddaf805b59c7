use super::*;
use proptest::prelude::*;
use serde_json::json;

fn request() -> NormalizeOptions {
    NormalizeOptions::request(SpecDialect::OpenApi3)
}

#[test]
fn nullable_becomes_union_with_null() {
    let schema = json!({"type": "string", "nullable": true, "minLength": 2});
    assert_eq!(
        normalize(&schema, &request()),
        json!({"anyOf": [{"type": "string", "minLength": 2}, {"type": "null"}]})
    );
}

#[test]
fn nested_nullable_nodes_are_converted_independently() {
    let schema = json!({
        "type": "object",
        "nullable": true,
        "properties": {
            "a": {"type": "integer", "nullable": true},
            "b": {"type": "array", "items": {"type": "boolean", "nullable": true}}
        }
    });
    assert_eq!(
        normalize(&schema, &request()),
        json!({
            "anyOf": [
                {
                    "type": "object",
                    "properties": {
                        "a": {"anyOf": [{"type": "integer"}, {"type": "null"}]},
                        "b": {
                            "type": "array",
                            "items": {"anyOf": [{"type": "boolean"}, {"type": "null"}]}
                        }
                    }
                },
                {"type": "null"}
            ]
        })
    );
}

#[test]
fn swagger_uses_its_own_nullable_keyword() {
    let schema = json!({"type": "integer", "x-nullable": true, "nullable": true});
    let options = NormalizeOptions::request(SpecDialect::Swagger2);
    assert_eq!(
        normalize(&schema, &options),
        json!({"anyOf": [{"type": "integer", "nullable": true}, {"type": "null"}]})
    );
}

#[test]
fn false_nullable_marker_is_dropped() {
    let schema = json!({"type": "integer", "nullable": false});
    assert_eq!(normalize(&schema, &request()), json!({"type": "integer"}));
}

#[test]
fn read_only_properties_are_excluded_from_requests() {
    let schema = json!({
        "type": "object",
        "properties": {
            "id": {"type": "integer", "readOnly": true},
            "name": {"type": "string"}
        },
        "required": ["id", "name"],
        "additionalProperties": false
    });
    let normalized = normalize(&schema, &request());
    assert_eq!(normalized["required"], json!(["name"]));
    assert_eq!(normalized["not"], json!({"required": ["id"]}));
    assert_eq!(normalized["properties"]["id"], json!({"type": "integer", "readOnly": true}));
}

#[test]
fn write_only_properties_are_excluded_from_responses() {
    let schema = json!({
        "type": "object",
        "properties": {
            "password": {"type": "string", "writeOnly": true},
            "token": {"type": "string", "x-writeOnly": true},
            "id": {"type": "integer", "readOnly": true}
        },
        "required": ["password"],
        "not": {"required": ["legacy"]}
    });
    let normalized = normalize(&schema, &NormalizeOptions::response(SpecDialect::OpenApi3));
    assert!(normalized.get("required").is_none());
    assert_eq!(
        normalized["not"],
        json!({"required": ["legacy", "password", "token"]})
    );
}

#[test]
fn exclusion_moves_to_all_of_beside_complex_not() {
    let schema = json!({
        "type": "object",
        "properties": {"id": {"readOnly": true}, "name": {"type": "string"}},
        "required": ["id", "name"],
        "not": {"type": "null"},
        "allOf": [{"minProperties": 1}]
    });
    let normalized = normalize(&schema, &request());
    assert_eq!(normalized["not"], json!({"type": "null"}));
    assert_eq!(normalized["required"], json!(["name"]));
    assert_eq!(
        normalized["allOf"],
        json!([{"minProperties": 1}, {"not": {"required": ["id"]}}])
    );
    assert_eq!(normalize(&normalized, &request()), normalized);

    let validator = jsonschema::draft202012::new(&normalized).expect("valid schema");
    assert!(validator.is_valid(&json!({"name": "a"})));
    assert!(!validator.is_valid(&json!({"id": 1, "name": "a"})));

    let schema = json!({
        "properties": {"id": {"readOnly": true}},
        "not": true
    });
    let normalized = normalize(&schema, &request());
    assert_eq!(normalized["allOf"], json!([{"not": {"required": ["id"]}}]));
}

#[test]
fn folding_only_when_enabled() {
    let schema = json!({"type": "string", "pattern": "^[a-z]*$", "minLength": 3, "maxLength": 5});
    assert_eq!(normalize(&schema, &request()), schema);
    let folded = normalize(&schema, &request().with_fold_lengths(true));
    assert_eq!(folded, json!({"type": "string", "pattern": "^([a-z]){3,5}$"}));
}

#[test]
fn boolean_exclusive_bounds_become_numeric() {
    let schema = json!({
        "type": "number",
        "minimum": 1,
        "exclusiveMinimum": true,
        "maximum": 9,
        "exclusiveMaximum": false
    });
    assert_eq!(
        normalize(&schema, &request()),
        json!({"type": "number", "exclusiveMinimum": 1, "maximum": 9})
    );
}

#[test]
fn swagger_file_type_becomes_binary_string() {
    let schema = json!({"type": "file"});
    let options = NormalizeOptions::request(SpecDialect::Swagger2);
    assert_eq!(
        normalize(&schema, &options),
        json!({"type": "string", "format": "binary"})
    );
}

#[test]
fn path_strings_get_a_lower_length_bound() {
    let options = request().for_location(Some(ParameterLocation::Path));
    assert_eq!(
        normalize(&json!({"type": "string"}), &options),
        json!({"type": "string", "minLength": 1})
    );
    assert_eq!(
        normalize(&json!({"type": "string", "pattern": "a*"}), &options),
        json!({"type": "string", "pattern": "a*"})
    );
    assert_eq!(
        normalize(&json!({"type": "integer"}), &options),
        json!({"type": "integer"})
    );
}

#[test]
fn malformed_keywords_pass_through() {
    let schema = json!({"type": "string", "nullable": "yes", "properties": 5, "anyOf": {}});
    assert_eq!(normalize(&schema, &request()), schema);
}

fn arb_schema() -> impl Strategy<Value = JsonValue> {
    let leaf = prop_oneof![
        Just(json!({"type": "string"})),
        Just(json!({"type": "integer", "nullable": true})),
        Just(json!({"type": "string", "pattern": "a+", "minLength": 2, "maxLength": 4})),
        Just(json!({"type": "string", "readOnly": true, "nullable": true})),
        Just(json!({"type": "number", "minimum": 0, "exclusiveMinimum": true})),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone(), any::<bool>()).prop_map(|(a, b, nullable)| {
                json!({
                    "type": "object",
                    "nullable": nullable,
                    "properties": {"a": a, "b": b},
                    "required": ["a", "b"]
                })
            }),
            inner.clone().prop_map(|items| json!({"type": "array", "items": items})),
            (inner.clone(), inner).prop_map(|(a, b)| json!({"anyOf": [a, b]})),
        ]
    })
}

proptest! {
    #[test]
    fn normalization_is_idempotent(schema in arb_schema(), fold in any::<bool>()) {
        let options = request().with_fold_lengths(fold);
        let once = normalize(&schema, &options);
        let twice = normalize(&once, &options);
        prop_assert_eq!(once, twice);
    }
}
