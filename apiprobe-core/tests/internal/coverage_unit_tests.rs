use super::*;
use crate::operation::{MediaTypeDefinition, RequestBody};
use serde_json::json;

const ALL_METHODS: [&str; 7] = ["get", "put", "post", "delete", "options", "patch", "trace"];

fn generate_with(
    config: &GenerationConfig,
    operation: &Operation,
    modes: &[GenerationMode],
) -> Vec<Case> {
    let table = MutationTable::standard();
    let arena = SchemaArena::default();
    CoverageGenerator::new(config, &table, &arena).generate(operation, modes)
}

fn generate(operation: &Operation, modes: &[GenerationMode]) -> Vec<Case> {
    generate_with(&GenerationConfig::default(), operation, modes)
}

/// Declares every candidate method so no unexpected-method cases appear.
fn closed(mut operation: Operation) -> Operation {
    operation.path_methods = ALL_METHODS.iter().map(|method| method.to_string()).collect();
    operation
}

fn json_body(schema: JsonValue, required: bool) -> RequestBody {
    RequestBody {
        required,
        content: vec![MediaTypeDefinition {
            media_type: "application/json".to_string(),
            schema,
            example: None,
            examples: None,
        }],
    }
}

fn description(case: &Case) -> &str {
    case.meta.phase.data.description.as_deref().unwrap_or_default()
}

fn object(value: JsonValue) -> JsonObject {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[test]
fn required_integer_query_parameter_positive_cases() {
    let mut operation = Operation::new("GET", "/items");
    operation.parameters.push(
        Parameter::new(
            "q1",
            ParameterLocation::Query,
            json!({"type": "integer", "minimum": 5}),
        )
        .required(),
    );
    let cases = generate(&operation, &[GenerationMode::Positive]);
    let queries: Vec<Option<JsonObject>> = cases.iter().map(|case| case.query.clone()).collect();
    assert_eq!(
        queries,
        vec![Some(object(json!({"q1": "6"}))), Some(object(json!({"q1": "5"})))]
    );
    assert_eq!(description(&cases[0]), "Near-boundary number");
    assert_eq!(cases[0].meta.phase.data.parameter.as_deref(), Some("q1"));
    assert_eq!(description(&cases[1]), "Default positive test case");
    assert_eq!(cases[0].id.as_str(), "GET /items:coverage:0");
    assert_eq!(cases[1].id.as_str(), "GET /items:coverage:1");
}

#[test]
fn constrained_body_property_negative_cases() {
    let mut operation = closed(Operation::new("POST", "/users"));
    operation.request_body = Some(json_body(
        json!({
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": {
                    "type": "string",
                    "minLength": 3,
                    "maxLength": 10,
                    "pattern": "^[a-zA-Z0-9-_]$"
                }
            }
        }),
        true,
    ));
    let cases = generate(&operation, &[GenerationMode::Negative]);
    assert_eq!(cases.len(), 14);

    let bodies: Vec<Option<JsonValue>> = cases.iter().map(|case| case.body.clone()).collect();
    for expected in [
        json!([null, null]),
        json!(""),
        json!(false),
        json!({}),
        json!({"name": 0}),
        json!({"name": null}),
        json!({"name": "00"}),
        json!({"name": "00000000000"}),
        json!({"name": "000"}),
    ] {
        assert!(bodies.contains(&Some(expected.clone())), "missing {expected}");
    }
    assert!(!bodies.contains(&Some(JsonValue::Null)));

    let missing = cases.last().expect("missing body case");
    assert_eq!(description(missing), "Missing request body");
    assert_eq!(missing.body, None);
    assert_eq!(missing.media_type, None);
    for case in &cases {
        assert!(case.meta.mode().is_negative());
        assert_eq!(
            case.meta.components.get(&ComponentKind::Body).map(|info| info.mode),
            Some(GenerationMode::Negative)
        );
    }
}

#[test]
fn unexpected_methods_use_defaults_or_allow_list() {
    let mut operation = Operation::new("POST", "/foo");
    operation.path_methods = vec!["post".to_string(), "get".to_string()];

    let cases = generate(&operation, &[GenerationMode::Negative]);
    let methods: HashSet<&str> = cases.iter().map(|case| case.method.as_str()).collect();
    assert_eq!(
        methods,
        HashSet::from(["PATCH", "TRACE", "DELETE", "OPTIONS", "PUT"])
    );
    for case in &cases {
        assert_eq!(
            description(case),
            format!("Unspecified HTTP method: {}", case.method)
        );
        assert!(case.meta.components.is_empty());
        assert!(case.meta.mode().is_negative());
        assert_eq!(case.path, "/foo");
    }

    let config = GenerationConfig {
        unexpected_methods: vec!["delete".to_string(), "put".to_string(), "post".to_string()],
        ..GenerationConfig::default()
    };
    let cases = generate_with(&config, &operation, &[GenerationMode::Negative]);
    let methods: Vec<&str> = cases.iter().map(|case| case.method.as_str()).collect();
    assert_eq!(methods, vec!["DELETE", "PUT"]);
}

#[test]
fn optional_properties_yield_one_removal_each() {
    let mut operation = closed(Operation::new("POST", "/notes"));
    operation.request_body = Some(json_body(
        json!({
            "type": "object",
            "required": ["id"],
            "properties": {
                "id": {"type": "string"},
                "title": {"type": "string"},
                "tags": {"type": "string"}
            }
        }),
        true,
    ));
    let cases = generate(&operation, &[GenerationMode::Positive]);
    let bodies: Vec<Option<JsonValue>> = cases.iter().map(|case| case.body.clone()).collect();
    assert_eq!(
        bodies,
        vec![
            Some(json!({"id": "", "title": ""})),
            Some(json!({"id": ""})),
            Some(json!({"id": "", "title": "", "tags": ""})),
        ]
    );
    assert_eq!(description(&cases[0]), "Missing optional property: tags");
    assert_eq!(description(&cases[1]), "Missing optional property: title");
}

#[test]
fn optional_parameters_are_removed_cumulatively() {
    let mut operation = closed(Operation::new("GET", "/search"));
    operation.parameters = vec![
        Parameter::new("q", ParameterLocation::Query, json!({"type": "string"})).required(),
        Parameter::new("page", ParameterLocation::Query, json!({"type": "string"})),
        Parameter::new("sort", ParameterLocation::Query, json!({"type": "string"})),
    ];
    let cases = generate(&operation, &[GenerationMode::Positive]);
    let descriptions: Vec<&str> = cases.iter().map(description).collect();
    assert_eq!(
        descriptions,
        vec![
            "Missing optional parameter `sort` at query",
            "Missing optional parameter `page` at query",
            "Default positive test case",
        ]
    );
    assert_eq!(cases[1].query, Some(object(json!({"q": ""}))));
}

#[test]
fn unconstrained_parameter_has_no_negative_cases() {
    let mut operation = closed(Operation::new("GET", "/anything"));
    operation
        .parameters
        .push(Parameter::new("q", ParameterLocation::Query, json!({})));
    assert!(generate(&operation, &[GenerationMode::Negative]).is_empty());
}

#[test]
fn required_parameters_are_omitted_and_duplicated() {
    let mut operation = closed(Operation::new("GET", "/items"));
    operation.parameters = vec![
        Parameter::new("limit", ParameterLocation::Query, json!({"type": "integer"})).required(),
        Parameter::new("X-Trace", ParameterLocation::Header, json!({"type": "string"})).required(),
    ];
    let cases = generate(&operation, &[GenerationMode::Negative]);

    let missing = cases
        .iter()
        .find(|case| description(case) == "Missing `limit` at query")
        .expect("missing limit case");
    assert_eq!(missing.query, None);
    assert_eq!(missing.headers, Some(object(json!({"X-Trace": ""}))));

    let duplicate = cases
        .iter()
        .find(|case| description(case) == "Duplicate `limit` at query")
        .expect("duplicate limit case");
    assert_eq!(duplicate.query, Some(object(json!({"limit": ["0", "0"]}))));

    // Header duplication is off by default.
    assert!(cases
        .iter()
        .all(|case| description(case) != "Duplicate `X-Trace` at header"));

    // Query type substitutes are stringified on the wire.
    assert!(cases
        .iter()
        .any(|case| case.query == Some(object(json!({"limit": "false"})))));
    let empty = cases
        .iter()
        .find(|case| case.query == Some(object(json!({"limit": ""}))))
        .expect("empty string substitute for an integer");
    assert_eq!(description(empty), "Incorrect type");
}

#[test]
fn mode_bookkeeping_holds_for_every_case() {
    let mut operation = Operation::new("PUT", "/items/{id}");
    operation.path_methods = vec!["put".to_string(), "get".to_string()];
    operation.parameters = vec![
        Parameter::new("id", ParameterLocation::Path, json!({"type": "integer", "minimum": 1}))
            .required(),
        Parameter::new(
            "verbose",
            ParameterLocation::Query,
            json!({"type": "boolean"}),
        ),
    ];
    operation.request_body = Some(json_body(
        json!({"type": "object", "properties": {"size": {"type": "integer", "maximum": 3}}}),
        false,
    ));

    let positive = generate(&operation, &[GenerationMode::Positive]);
    assert!(!positive.is_empty());
    for case in &positive {
        assert!(case.meta.mode().is_positive());
        assert!(case
            .meta
            .components
            .values()
            .all(|info| info.mode.is_positive()));
    }

    let mixed = generate(
        &operation,
        &[GenerationMode::Positive, GenerationMode::Negative],
    );
    let last = mixed.last().expect("base case");
    assert_eq!(description(last), "Default positive test case");
    assert_eq!(last.path_parameters, Some(object(json!({"id": "1"}))));
    for case in &mixed {
        let negatives = case
            .meta
            .components
            .values()
            .filter(|info| info.mode.is_negative())
            .count();
        if case.meta.mode().is_negative() {
            assert!(negatives == 1 || case.meta.components.is_empty());
        } else {
            assert_eq!(negatives, 0);
        }
    }
}

#[test]
fn generation_is_deterministic_and_deduplicated() {
    let mut operation = Operation::new("POST", "/orders");
    operation.parameters.push(
        Parameter::new(
            "status",
            ParameterLocation::Query,
            json!({"type": "string", "enum": ["open", "closed"]}),
        )
        .required(),
    );
    operation.request_body = Some(json_body(
        json!({"type": "array", "items": {"type": "number"}, "maxItems": 2}),
        true,
    ));
    let modes = [GenerationMode::Negative, GenerationMode::Positive];
    let first = generate(&operation, &modes);
    let second = generate(&operation, &modes);
    assert_eq!(first, second);

    let keys: HashSet<String> = first.iter().map(Case::request_key).collect();
    assert_eq!(keys.len(), first.len());
    for (index, case) in first.iter().enumerate() {
        assert_eq!(case.id.as_str(), format!("POST /orders:coverage:{index}"));
    }
}

#[test]
fn unresolvable_component_does_not_block_others() {
    let mut operation = closed(Operation::new("GET", "/refs"));
    operation.parameters = vec![
        Parameter::new(
            "broken",
            ParameterLocation::Query,
            json!({"$ref": "#/definitions/Missing"}),
        ),
        Parameter::new("X-Id", ParameterLocation::Header, json!({"type": "string"})).required(),
    ];
    let cases = generate(&operation, &[GenerationMode::Positive]);
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].query, None);
    assert_eq!(cases[0].headers, Some(object(json!({"X-Id": ""}))));
}

#[test]
fn alternative_media_types_get_their_own_case() {
    let mut operation = closed(Operation::new("POST", "/upload"));
    operation.request_body = Some(RequestBody {
        required: true,
        content: vec![
            MediaTypeDefinition {
                media_type: "application/json".to_string(),
                schema: json!({"type": "object"}),
                example: None,
                examples: None,
            },
            MediaTypeDefinition {
                media_type: "text/plain".to_string(),
                schema: json!({"type": "string"}),
                example: Some(json!("hello")),
                examples: None,
            },
        ],
    });
    let cases = generate(&operation, &[GenerationMode::Positive]);
    assert_eq!(cases.len(), 2);
    assert_eq!(description(&cases[0]), "Alternative media type");
    assert_eq!(cases[0].media_type.as_deref(), Some("text/plain"));
    assert_eq!(cases[0].body, Some(json!("hello")));
    assert_eq!(cases[1].media_type.as_deref(), Some("application/json"));
    assert_eq!(cases[1].body, Some(json!({})));
}
