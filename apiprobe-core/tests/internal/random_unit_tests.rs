use super::*;
use crate::operation::{MediaTypeDefinition, Parameter, RequestBody};
use crate::schema::SchemaCheck;
use serde_json::json;

fn config(seed: u64) -> ProbeConfig {
    let mut config = ProbeConfig::default();
    config.fuzzing.seed = seed;
    config
}

fn sample_values(schema: &JsonValue, count: usize) -> Vec<JsonValue> {
    let patterns = PatternIndex::from_schemas([schema]);
    let strategy = value_strategy(schema, &patterns).expect("strategy");
    let mut runner = TestRunner::deterministic();
    (0..count)
        .map(|_| strategy.new_tree(&mut runner).expect("value tree").current())
        .collect()
}

fn orders() -> Operation {
    let mut operation = Operation::new("post", "/orders/{id}");
    operation.parameters = vec![
        Parameter::new("id", ParameterLocation::Path, json!({"type": "integer", "minimum": 1}))
            .required(),
        Parameter::new("dry_run", ParameterLocation::Query, json!({"type": "boolean"})),
    ];
    operation.request_body = Some(RequestBody {
        required: true,
        content: vec![MediaTypeDefinition {
            media_type: "application/json".to_string(),
            schema: order_schema(),
            example: None,
            examples: None,
        }],
    });
    operation
}

fn order_schema() -> JsonValue {
    json!({
        "type": "object",
        "required": ["sku", "quantity"],
        "properties": {
            "sku": {"type": "string", "pattern": "^[A-Z]+$", "minLength": 2, "maxLength": 4},
            "quantity": {"type": "integer", "minimum": 1, "maximum": 99},
            "note": {"type": "string", "nullable": true, "maxLength": 8},
            "tags": {"type": "array", "items": {"enum": ["a", "b", "c"]}, "uniqueItems": true}
        }
    })
}

#[test]
fn same_seed_reproduces_the_sequence() {
    let arena = SchemaArena::default();
    let first: Vec<Case> = RandomCases::new(&orders(), &arena, &config(7))
        .expect("random cases")
        .take(10)
        .collect();
    let second: Vec<Case> = RandomCases::new(&orders(), &arena, &config(7))
        .expect("random cases")
        .take(10)
        .collect();
    assert_eq!(first.len(), 10);
    assert_eq!(first, second);
}

#[test]
fn cases_are_positive_fuzzing_cases() {
    let arena = SchemaArena::default();
    let cases: Vec<Case> = RandomCases::new(&orders(), &arena, &config(1))
        .expect("random cases")
        .take(3)
        .collect();
    assert_eq!(cases[0].id.as_str(), "POST /orders/{id}:fuzzing:0");
    assert_eq!(cases[2].id.as_str(), "POST /orders/{id}:fuzzing:2");
    for case in &cases {
        assert_eq!(case.method, "POST");
        assert_eq!(case.meta.phase.name, PhaseName::Fuzzing);
        assert!(case.meta.mode().is_positive());
        assert!(case.meta.components.contains_key(&ComponentKind::Body));
        assert!(case.meta.components.contains_key(&ComponentKind::Query));
        assert_eq!(case.media_type.as_deref(), Some("application/json"));
    }
}

#[test]
fn generated_bodies_satisfy_the_schema() {
    let arena = SchemaArena::default();
    let options = NormalizeOptions::request(crate::operation::SpecDialect::OpenApi3);
    let check = SchemaCheck::new(&normalize(&order_schema(), &options));
    for case in RandomCases::new(&orders(), &arena, &config(3))
        .expect("random cases")
        .take(50)
    {
        let body = case.body.expect("required body");
        assert!(check.accepts(&body), "{body} should be accepted");
    }
}

#[test]
fn parameter_values_are_stringified() {
    let arena = SchemaArena::default();
    for case in RandomCases::new(&orders(), &arena, &config(5))
        .expect("random cases")
        .take(20)
    {
        let id = case
            .path_parameters
            .as_ref()
            .and_then(|parameters| parameters.get("id"))
            .and_then(JsonValue::as_str)
            .expect("string id");
        assert!(id.parse::<i64>().expect("integer id") >= 1);
        if let Some(flag) = case.query.as_ref().and_then(|query| query.get("dry_run")) {
            assert!(flag == "true" || flag == "false");
        }
    }
}

#[test]
fn unsupported_required_component_fails() {
    let mut operation = Operation::new("GET", "/words");
    operation.parameters.push(
        Parameter::new(
            "word",
            ParameterLocation::Query,
            json!({"type": "string", "pattern": "\\bword\\b"}),
        )
        .required(),
    );
    let error = RandomCases::new(&operation, &SchemaArena::default(), &config(0))
        .expect_err("unsupported pattern");
    assert!(matches!(
        error,
        GenerationError::UnsupportedSchema { ref component, .. } if component == "query parameter 'word'"
    ));
}

#[test]
fn unsupported_optional_component_is_skipped() {
    let mut operation = Operation::new("GET", "/words");
    operation.parameters.push(Parameter::new(
        "word",
        ParameterLocation::Query,
        json!({"$ref": "#/definitions/Missing"}),
    ));
    let case = RandomCases::new(&operation, &SchemaArena::default(), &config(0))
        .expect("random cases")
        .next()
        .expect("a case");
    assert_eq!(case.query, None);
    assert!(case.meta.components.is_empty());
}

#[test]
fn strategies_respect_bounds() {
    for value in sample_values(&json!({"type": "integer", "exclusiveMinimum": 2, "maximum": 4}), 30) {
        let value = value.as_i64().expect("integer");
        assert!((3..=4).contains(&value));
    }
    for value in sample_values(&json!({"type": "integer", "multipleOf": 5, "minimum": 1, "maximum": 20}), 30) {
        assert_eq!(value.as_i64().expect("integer") % 5, 0);
    }
    for value in sample_values(&json!({"enum": ["x", "y"]}), 10) {
        assert!(value == json!("x") || value == json!("y"));
    }
    for value in sample_values(&json!({"type": "string", "pattern": "^([a-z]){3,5}$"}), 20) {
        let text = value.as_str().expect("string");
        assert!((3..=5).contains(&text.len()));
        assert!(text.chars().all(|ch| ch.is_ascii_lowercase()));
    }
}

#[test]
fn unsatisfiable_schemas_are_reported() {
    let patterns = PatternIndex::default();
    assert!(value_strategy(&json!(false), &patterns).is_err());
    assert!(value_strategy(&json!({"enum": []}), &patterns).is_err());
    assert!(value_strategy(&json!({"type": "string", "minLength": 5, "maxLength": 2}), &patterns).is_err());
    assert!(value_strategy(&json!({"type": "string", "pattern": "[a-z]"}), &patterns).is_err());
}
