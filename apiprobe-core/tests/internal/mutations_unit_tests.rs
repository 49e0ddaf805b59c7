use super::*;
use serde_json::json;

fn negatives_at(schema: JsonValue, location: Option<ParameterLocation>) -> Vec<(JsonValue, String)> {
    let table = MutationTable::standard();
    let context = MutationContext {
        table: &table,
        location,
    };
    context
        .negatives(&schema)
        .into_iter()
        .map(|candidate| (candidate.value, candidate.description))
        .collect()
}

fn negatives(schema: JsonValue) -> Vec<(JsonValue, String)> {
    negatives_at(schema, None)
}

fn values(found: &[(JsonValue, String)]) -> Vec<JsonValue> {
    found.iter().map(|(value, _)| value.clone()).collect()
}

fn described(found: &[(JsonValue, String)], description: &str) -> Vec<JsonValue> {
    found
        .iter()
        .filter(|(_, text)| text == description)
        .map(|(value, _)| value.clone())
        .collect()
}

#[test]
fn standard_table_order() {
    let kinds: Vec<MutationKind> = MutationTable::standard().kinds().collect();
    assert_eq!(kinds.len(), 14);
    assert_eq!(kinds[0], MutationKind::TypeMismatch);
    assert_eq!(kinds[7], MutationKind::MissingProperty);
    assert_eq!(kinds[13], MutationKind::ObjectProperties);
    assert_eq!(MutationKind::MaxLength.to_string(), "max_length");
}

#[test]
fn filtered_table_drops_kinds() {
    let table = MutationTable::standard().filtered(|kind| kind != MutationKind::TypeMismatch);
    let kinds: Vec<MutationKind> = table.kinds().collect();
    assert_eq!(kinds.len(), 13);
    assert_eq!(kinds[0], MutationKind::Enum);

    let context = MutationContext {
        table: &table,
        location: None,
    };
    assert!(context.negatives(&json!({"type": "string"})).is_empty());
}

#[test]
fn unconstrained_schema_has_no_negatives() {
    assert!(negatives(json!({})).is_empty());
    assert!(negatives(json!({"description": "anything"})).is_empty());
    assert!(negatives(json!(true)).is_empty());
}

#[test]
fn body_type_substitutes_skip_allowed_types() {
    let found = negatives(json!({"type": "string"}));
    assert_eq!(
        values(&found),
        vec![json!({}), json!([null, null]), json!(null), json!(false), json!(0)]
    );
    assert!(found.iter().all(|(_, text)| text == "Incorrect type"));

    // `number` allows integers, so `0` is not a mismatch.
    let found = negatives(json!({"type": "number"}));
    assert_eq!(
        values(&found),
        vec![json!({}), json!([null, null]), json!(""), json!(null), json!(false)]
    );
}

#[test]
fn parameter_type_substitutes_follow_location_rules() {
    let query = negatives_at(json!({"type": "integer"}), Some(ParameterLocation::Query));
    assert_eq!(
        values(&query),
        vec![json!([null, null]), json!(""), json!(null), json!(false)]
    );

    let header = negatives_at(json!({"type": "string"}), Some(ParameterLocation::Header));
    assert_eq!(
        values(&header),
        vec![json!({}), json!([null, null]), json!(null), json!(false)]
    );

    let nullable = negatives_at(
        json!({"anyOf": [{"type": "boolean"}, {"type": "null"}]}),
        Some(ParameterLocation::Path),
    );
    assert_eq!(
        values(&nullable),
        vec![json!({}), json!([null, null]), json!(""), json!(0)]
    );
}

#[test]
fn enum_violation_picks_outside_value() {
    assert_eq!(
        negatives(json!({"enum": ["a", "bb"]})),
        vec![(json!("bb0"), "Invalid enum value".to_string())]
    );
    assert_eq!(described(&negatives(json!({"enum": [1, 5]})), "Invalid enum value"), vec![json!(6)]);
    assert_eq!(described(&negatives(json!({"const": true})), "Invalid enum value"), vec![json!(false)]);
}

#[test]
fn numeric_bounds_are_crossed_by_one() {
    let found = negatives(json!({"type": "integer", "minimum": 5, "maximum": 10}));
    assert_eq!(described(&found, "Value smaller than minimum"), vec![json!(4)]);
    assert_eq!(described(&found, "Value greater than maximum"), vec![json!(11)]);

    let exclusive = negatives(json!({"type": "number", "exclusiveMinimum": 5, "exclusiveMaximum": 9}));
    assert_eq!(described(&exclusive, "Value smaller than minimum"), vec![json!(5)]);
    assert_eq!(described(&exclusive, "Value greater than maximum"), vec![json!(9)]);
}

#[test]
fn string_lengths_are_crossed_by_one() {
    let found = negatives(json!({"type": "string", "minLength": 2, "maxLength": 4}));
    assert_eq!(described(&found, "String larger than maxLength"), vec![json!("00000")]);
    assert_eq!(described(&found, "String smaller than minLength"), vec![json!("0")]);

    // A zero minimum has nothing below it.
    let found = negatives(json!({"type": "string", "minLength": 0}));
    assert!(described(&found, "String smaller than minLength").is_empty());
}

#[test]
fn pattern_violation_uses_canonical_string() {
    let found = negatives(json!({"type": "string", "pattern": "^[0-9]+$"}));
    assert_eq!(described(&found, "String not matching pattern"), vec![json!("a")]);

    let found = negatives(json!({"type": "string", "pattern": ".*"}));
    assert!(described(&found, "String not matching pattern").is_empty());
}

#[test]
fn each_required_property_is_omitted_alone() {
    let found = negatives(json!({
        "type": "object",
        "required": ["a", "b"],
        "properties": {"a": {"type": "string"}, "b": {"type": "integer"}}
    }));
    assert_eq!(described(&found, "Missing required property: a"), vec![json!({"b": 0})]);
    assert_eq!(described(&found, "Missing required property: b"), vec![json!({"a": ""})]);
}

#[test]
fn additional_property_only_when_forbidden() {
    let closed = negatives(json!({
        "type": "object",
        "properties": {"a": {"type": "string"}},
        "additionalProperties": false
    }));
    assert_eq!(
        described(&closed, "Object with unexpected properties"),
        vec![json!({"a": "", "x-unknown-property": 42})]
    );

    let open = negatives(json!({"type": "object", "properties": {"a": {"type": "string"}}}));
    assert!(described(&open, "Object with unexpected properties").is_empty());
}

#[test]
fn array_constraints() {
    let found = negatives(json!({
        "type": "array",
        "items": {"type": "integer"},
        "minItems": 2,
        "maxItems": 3,
        "uniqueItems": true
    }));
    assert_eq!(described(&found, "Array smaller than minItems"), vec![json!([0])]);
    assert_eq!(described(&found, "Array larger than maxItems"), vec![json!([0, 0, 0, 0])]);
    assert_eq!(described(&found, "Non-unique items"), vec![json!([0, 0])]);
    // Item mutations keep the remaining items at their base value.
    assert!(described(&found, "Incorrect type").contains(&json!([null, 0])));
}

#[test]
fn nested_property_mutations_embed_in_base_object() {
    let found = negatives(json!({
        "type": "object",
        "required": ["id"],
        "properties": {
            "id": {"type": "integer", "minimum": 1},
            "tag": {"type": "string"}
        }
    }));
    assert_eq!(
        described(&found, "Value smaller than minimum"),
        vec![json!({"id": 0, "tag": ""})]
    );
    assert!(described(&found, "Incorrect type").contains(&json!({"id": null, "tag": ""})));
    assert!(described(&found, "Incorrect type").contains(&json!({"tag": 0, "id": 1})));
}

#[test]
fn every_negative_is_rejected_and_unique() {
    let schema = json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": {"type": "string", "minLength": 3, "maxLength": 10, "pattern": "^[a-zA-Z0-9-_]$"}
        }
    });
    let found = negatives(schema.clone());
    let check = SchemaCheck::new(&schema);
    let mut seen = HashSet::new();
    for (value, _) in &found {
        assert!(check.rejects(value), "{value} should be rejected");
        assert!(seen.insert(value.to_string()), "{value} is duplicated");
    }
    // Four top-level substitutes, one omission, eight property violations.
    assert_eq!(found.len(), 13);
}
