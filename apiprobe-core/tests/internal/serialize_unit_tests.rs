use super::*;
use crate::{CaseId, CaseMeta, PhaseData, PhaseName};
use serde_json::{json, Value as JsonValue};

fn parameter(name: &str, location: ParameterLocation, schema: JsonValue) -> Parameter {
    Parameter::new(name, location, schema)
}

fn object(value: JsonValue) -> JsonObject {
    value.as_object().cloned().expect("object")
}

fn serialize_one(dialect: SpecDialect, parameter: Parameter, value: JsonValue) -> JsonValue {
    let name = parameter.name.clone();
    let serializer = LocationSerializer::for_parameters(dialect, [&parameter]);
    let mut values = JsonObject::new();
    values.insert(name, value);
    JsonValue::Object(serializer.apply(&values))
}

#[test]
fn path_label_arrays_follow_explode() {
    let schema = json!({"type": "array", "items": {"type": "integer"}});
    let flat = parameter("id", ParameterLocation::Path, schema.clone())
        .with_style(ParameterStyle::Label, Some(false));
    assert_eq!(
        serialize_one(SpecDialect::OpenApi3, flat, json!([3, 4, 5])),
        json!({"id": ".3,4,5"})
    );
    let exploded = parameter("id", ParameterLocation::Path, schema)
        .with_style(ParameterStyle::Label, Some(true));
    assert_eq!(
        serialize_one(SpecDialect::OpenApi3, exploded, json!([3, 4, 5])),
        json!({"id": ".3.4.5"})
    );
}

#[test]
fn path_defaults_to_simple_and_strings() {
    let number = parameter("id", ParameterLocation::Path, json!({"type": "integer"}));
    assert_eq!(
        serialize_one(SpecDialect::OpenApi3, number, json!(42)),
        json!({"id": "42"})
    );
    let object_param = parameter(
        "point",
        ParameterLocation::Path,
        json!({"type": "object", "properties": {"x": {}, "y": {}}}),
    );
    assert_eq!(
        serialize_one(SpecDialect::OpenApi3, object_param, json!({"x": 1, "y": 2})),
        json!({"point": "x,1,y,2"})
    );
    let array = parameter("ids", ParameterLocation::Path, json!({"items": {}}));
    assert_eq!(
        serialize_one(SpecDialect::OpenApi3, array, json!([1, 2])),
        json!({"ids": "1,2"})
    );
}

#[test]
fn path_matrix_primitive() {
    let param = parameter("id", ParameterLocation::Path, json!({"type": "string"}))
        .with_style(ParameterStyle::Matrix, None);
    assert_eq!(
        serialize_one(SpecDialect::OpenApi3, param, json!("5")),
        json!({"id": ";id=5"})
    );
}

#[test]
fn query_form_defaults() {
    let array = parameter("tags", ParameterLocation::Query, json!({"type": "array"}));
    assert_eq!(
        serialize_one(SpecDialect::OpenApi3, array.clone(), json!(["a", "b"])),
        json!({"tags": ["a", "b"]})
    );
    let flat = array.with_style(ParameterStyle::Form, Some(false));
    assert_eq!(
        serialize_one(SpecDialect::OpenApi3, flat, json!(["a", "b"])),
        json!({"tags": "a,b"})
    );

    let filter = parameter("filter", ParameterLocation::Query, json!({"type": "object"}));
    let mut values = object(json!({"page": "1", "filter": {"role": "admin", "active": "true"}}));
    let serializer = LocationSerializer::for_parameters(SpecDialect::OpenApi3, [&filter]);
    values = serializer.apply(&values);
    assert_eq!(
        JsonValue::Object(values),
        json!({"page": "1", "role": "admin", "active": "true"})
    );
}

#[test]
fn query_delimited_styles() {
    let schema = json!({"type": "array"});
    for (style, expected) in [
        (ParameterStyle::SpaceDelimited, "a b"),
        (ParameterStyle::PipeDelimited, "a|b"),
    ] {
        let param = parameter("q", ParameterLocation::Query, schema.clone())
            .with_style(style, Some(false));
        assert_eq!(
            serialize_one(SpecDialect::OpenApi3, param, json!(["a", "b"])),
            json!({ "q": expected })
        );
    }
}

#[test]
fn query_deep_object() {
    let param = parameter("id", ParameterLocation::Query, json!({"type": "object"}))
        .with_style(ParameterStyle::DeepObject, Some(true));
    assert_eq!(
        serialize_one(
            SpecDialect::OpenApi3,
            param.clone(),
            json!({"role": "admin", "firstName": "Alex"})
        ),
        json!({"id[role]": "admin", "id[firstName]": "Alex"})
    );
    assert_eq!(
        serialize_one(SpecDialect::OpenApi3, param, json!({})),
        json!({"id": ""})
    );
}

#[test]
fn headers_are_strings_with_simple_style() {
    let count = parameter("X-Count", ParameterLocation::Header, json!({"type": "integer"}));
    assert_eq!(
        serialize_one(SpecDialect::OpenApi3, count, json!(3)),
        json!({"X-Count": "3"})
    );
    let ids = parameter("X-Ids", ParameterLocation::Header, json!({"type": "array"}));
    assert_eq!(
        serialize_one(SpecDialect::OpenApi3, ids, json!([1, 2])),
        json!({"X-Ids": "1,2"})
    );
    let exploded = parameter("X-Obj", ParameterLocation::Header, json!({"type": "object"}))
        .with_style(ParameterStyle::Simple, Some(true));
    assert_eq!(
        serialize_one(SpecDialect::OpenApi3, exploded, json!({"a": 1, "b": 2})),
        json!({"X-Obj": "a=1,b=2"})
    );
}

#[test]
fn exploded_cookie_collections_are_dropped() {
    let exploded = parameter("session", ParameterLocation::Cookie, json!({"type": "array"}))
        .with_style(ParameterStyle::Form, Some(true));
    assert_eq!(
        serialize_one(SpecDialect::OpenApi3, exploded, json!(["a", "b"])),
        json!({})
    );
    let flat = parameter("session", ParameterLocation::Cookie, json!({"type": "array"}));
    assert_eq!(
        serialize_one(SpecDialect::OpenApi3, flat, json!(["a", "b"])),
        json!({"session": "a,b"})
    );
    let scalar = parameter("token", ParameterLocation::Cookie, json!({"type": "boolean"}));
    assert_eq!(
        serialize_one(SpecDialect::OpenApi3, scalar, json!(false)),
        json!({"token": "false"})
    );
}

#[test]
fn json_content_parameters_are_encoded() {
    let mut param = parameter("filter", ParameterLocation::Query, json!({"type": "object"}));
    param.media_type = Some("application/json".to_string());
    assert_eq!(
        serialize_one(SpecDialect::OpenApi3, param, json!({"a": [1, 2]})),
        json!({"filter": "{\"a\":[1,2]}"})
    );
}

#[test]
fn swagger_collection_formats() {
    let schema = json!({"type": "array"});
    let csv = parameter("ids", ParameterLocation::Query, schema.clone());
    assert_eq!(
        serialize_one(SpecDialect::Swagger2, csv, json!([1, 2])),
        json!({"ids": "1,2"})
    );
    for (format, expected) in [
        (CollectionFormat::Ssv, json!("1 2")),
        (CollectionFormat::Tsv, json!("1\t2")),
        (CollectionFormat::Pipes, json!("1|2")),
        (CollectionFormat::Multi, json!([1, 2])),
    ] {
        let mut param = parameter("ids", ParameterLocation::Query, schema.clone());
        param.collection_format = Some(format);
        assert_eq!(
            serialize_one(SpecDialect::Swagger2, param, json!([1, 2])),
            json!({ "ids": expected })
        );
    }
    let header = parameter("X-Rate", ParameterLocation::Header, json!({"type": "number"}));
    assert_eq!(
        serialize_one(SpecDialect::Swagger2, header, json!(1.5)),
        json!({"X-Rate": "1.5"})
    );
}

#[test]
fn untouched_keys_survive() {
    let param = parameter("ids", ParameterLocation::Query, json!({"type": "array"}))
        .with_style(ParameterStyle::Form, Some(false));
    let serializer = LocationSerializer::for_parameters(SpecDialect::OpenApi3, [&param]);
    let values = object(json!({"other": [1, 2], "ids": [3]}));
    let serialized = serializer.apply(&values);
    assert_eq!(serialized.get("other"), Some(&json!([1, 2])));
    assert_eq!(serialized.get("ids"), Some(&json!("3")));
    assert_eq!(values.get("ids"), Some(&json!([3])));
}

#[test]
fn first_declared_transform_is_outermost() {
    let serializer = LocationSerializer::new(vec![
        Transform::ToString {
            name: "id".to_string(),
        },
        Transform::Label {
            name: "id".to_string(),
            shape: ValueShape::Array,
            explode: true,
        },
    ]);
    let serialized = serializer.apply(&object(json!({"id": [1, 2]})));
    assert_eq!(serialized.get("id"), Some(&json!(".1.2")));
}

#[test]
fn operation_serializer_rewrites_case_locations() {
    let mut operation = Operation::new("GET", "/users/{id}");
    operation.parameters = vec![
        parameter("id", ParameterLocation::Path, json!({"type": "array"}))
            .with_style(ParameterStyle::Label, Some(false)),
        parameter("X-Tags", ParameterLocation::Header, json!({"type": "array"})),
    ];
    let serializer = OperationSerializer::new(&operation);
    assert!(serializer.location(ParameterLocation::Query).is_none());
    let case = Case {
        id: CaseId::new("case"),
        operation: operation.label(),
        method: "GET".to_string(),
        path: operation.path.clone(),
        path_parameters: Some(object(json!({"id": ["3", "4", "5"]}))),
        query: None,
        headers: Some(object(json!({"X-Tags": ["a", "b"]}))),
        cookies: None,
        body: Some(json!({"untouched": [1]})),
        media_type: Some("application/json".to_string()),
        meta: CaseMeta::new(PhaseName::Coverage, PhaseData::default(), Default::default()),
    };
    let serialized = serializer.serialize(&case);
    assert_eq!(serialized.path_parameters, Some(object(json!({"id": ".3,4,5"}))));
    assert_eq!(serialized.headers, Some(object(json!({"X-Tags": "a,b"}))));
    assert_eq!(serialized.body, case.body);
    assert_eq!(serialized.formatted_path(), "/users/.3,4,5");
}
