//! Positive values of a single schema.

use std::collections::HashSet;

use serde_json::Value as JsonValue;

use super::patterns::minimal_match;
use super::Candidate;
use crate::schema::{
    forbidden_keys, inferred_type, merge_all_of, required_keys, union_branches, SchemaCheck,
};
use crate::JsonObject;

/// Longest string or array materialized for a boundary value.
pub(crate) const MAX_MATERIALIZED_LENGTH: u64 = 10_000;

/// `maxItems` variants are only produced this close to the base length.
const MAX_ITEMS_VARIANT_SPAN: u64 = 100;

pub(crate) const DEFAULT_POSITIVE: &str = "Default positive test case";

/// Ordered, deduplicated values accepted by `schema`; the first one is the
/// base value. Empty when the schema is unsatisfiable.
pub(crate) fn positive_values(schema: &JsonValue) -> Vec<Candidate> {
    let map = match schema {
        JsonValue::Bool(false) => return Vec::new(),
        JsonValue::Object(map) => map,
        _ => return vec![Candidate::new(JsonValue::String(String::new()), DEFAULT_POSITIVE)],
    };
    let merged = merge_all_of(map);
    let mut candidates = schema_examples(&merged);
    candidates.extend(typed_values(&merged));
    accepted(schema, candidates)
}

/// Keeps the candidates `schema` accepts, first occurrence of each value.
pub(crate) fn accepted(schema: &JsonValue, candidates: Vec<Candidate>) -> Vec<Candidate> {
    let check = SchemaCheck::new(schema);
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| check.accepts(&candidate.value))
        .filter(|candidate| seen.insert(candidate.value.to_string()))
        .collect()
}

/// Base value of `schema`, if it has one.
pub(crate) fn base_value(schema: &JsonValue) -> Option<JsonValue> {
    positive_values(schema)
        .into_iter()
        .next()
        .map(|candidate| candidate.value)
}

fn schema_examples(schema: &JsonObject) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    if let Some(example) = schema.get("example") {
        candidates.push(Candidate::new(example.clone(), "Example value"));
    }
    if let Some(JsonValue::Array(examples)) = schema.get("examples") {
        candidates.extend(
            examples
                .iter()
                .map(|example| Candidate::new(example.clone(), "Example value")),
        );
    }
    if let Some(default) = schema.get("default") {
        candidates.push(Candidate::new(default.clone(), "Default value"));
    }
    candidates
}

fn typed_values(schema: &JsonObject) -> Vec<Candidate> {
    if let Some(value) = schema.get("const") {
        return vec![Candidate::new(value.clone(), "Enum value")];
    }
    if let Some(JsonValue::Array(members)) = schema.get("enum") {
        return members
            .iter()
            .map(|member| Candidate::new(member.clone(), "Enum value"))
            .collect();
    }
    if let Some(branches) = union_branches(schema) {
        return branches
            .into_iter()
            .flat_map(|branch| {
                let branch = JsonValue::Object(branch);
                positive_values(&branch)
            })
            .collect();
    }
    match inferred_type(schema) {
        Some("null") => vec![Candidate::new(JsonValue::Null, DEFAULT_POSITIVE)],
        Some("boolean") => vec![
            Candidate::new(JsonValue::Bool(false), "Boolean value"),
            Candidate::new(JsonValue::Bool(true), "Boolean value"),
        ],
        Some("integer") | Some("number") => number_values(schema),
        Some("string") => string_values(schema),
        Some("array") => array_values(schema),
        Some("object") => object_values(schema),
        _ => vec![Candidate::new(JsonValue::String(String::new()), DEFAULT_POSITIVE)],
    }
}

/// JSON number, integral when the value has no fractional part.
pub(crate) fn number(value: f64) -> JsonValue {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        JsonValue::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

/// Inclusive numeric bounds, exclusive ones shifted by one.
pub(crate) fn numeric_bounds(schema: &JsonObject) -> (Option<f64>, Option<f64>) {
    let minimum = schema
        .get("exclusiveMinimum")
        .and_then(JsonValue::as_f64)
        .map(|bound| bound + 1.0)
        .or_else(|| schema.get("minimum").and_then(JsonValue::as_f64));
    let maximum = schema
        .get("exclusiveMaximum")
        .and_then(JsonValue::as_f64)
        .map(|bound| bound - 1.0)
        .or_else(|| schema.get("maximum").and_then(JsonValue::as_f64));
    (minimum, maximum)
}

fn number_values(schema: &JsonObject) -> Vec<Candidate> {
    let (mut minimum, mut maximum) = numeric_bounds(schema);
    let step = schema
        .get("multipleOf")
        .and_then(JsonValue::as_f64)
        .filter(|step| *step > 0.0)
        .unwrap_or(1.0);
    if step != 1.0 {
        minimum = minimum.map(|min| (min / step).ceil() * step);
        maximum = maximum.map(|max| (max / step).floor() * step);
    }
    if schema.get("type").and_then(JsonValue::as_str) == Some("integer") {
        minimum = minimum.map(f64::ceil);
        maximum = maximum.map(f64::floor);
    }
    let values = match (minimum, maximum) {
        (Some(min), Some(max)) if min > max => Vec::new(),
        (Some(min), Some(max)) => {
            let mut values = vec![(min, "Minimum value")];
            if min + step < max {
                values.push((min + step, "Near-boundary number"));
            }
            if max != min {
                values.push((max, "Maximum value"));
            }
            values
        }
        (Some(min), None) => vec![(min, "Minimum value"), (min + step, "Near-boundary number")],
        (None, Some(max)) => vec![(max, "Maximum value"), (max - step, "Near-boundary number")],
        (None, None) => vec![(0.0, DEFAULT_POSITIVE)],
    };
    values
        .into_iter()
        .map(|(value, description)| Candidate::new(number(value), description))
        .collect()
}

fn length_bounds(schema: &JsonObject, min_key: &str, max_key: &str) -> (u64, Option<u64>) {
    let min = schema.get(min_key).and_then(JsonValue::as_u64).unwrap_or(0);
    let max = schema.get(max_key).and_then(JsonValue::as_u64);
    (min, max)
}

fn zeros(length: u64) -> JsonValue {
    JsonValue::String("0".repeat(length as usize))
}

fn format_value(format: &str) -> Option<&'static str> {
    Some(match format {
        "date" => "2000-01-01",
        "date-time" => "2000-01-01T00:00:00Z",
        "time" => "00:00:00Z",
        "uuid" => "00000000-0000-0000-0000-000000000000",
        "email" => "user@example.com",
        "ipv4" => "127.0.0.1",
        "ipv6" => "::1",
        "uri" | "url" => "http://example.com",
        "hostname" => "example.com",
        _ => return None,
    })
}

fn string_values(schema: &JsonObject) -> Vec<Candidate> {
    let (min, max) = length_bounds(schema, "minLength", "maxLength");
    if let Some(pattern) = schema.get("pattern").and_then(JsonValue::as_str) {
        return minimal_match(pattern, min as usize, max.map(|max| max as usize))
            .map(|value| vec![Candidate::new(JsonValue::String(value), DEFAULT_POSITIVE)])
            .unwrap_or_default();
    }
    if let Some(value) = schema
        .get("format")
        .and_then(JsonValue::as_str)
        .and_then(format_value)
    {
        return vec![Candidate::new(JsonValue::String(value.to_string()), DEFAULT_POSITIVE)];
    }
    if max.is_some_and(|max| max < min) || min > MAX_MATERIALIZED_LENGTH {
        return Vec::new();
    }
    let declared = schema.contains_key("minLength") || schema.contains_key("maxLength");
    if !declared {
        return vec![Candidate::new(zeros(0), DEFAULT_POSITIVE)];
    }
    let mut values = vec![Candidate::new(zeros(min), "Minimum length string")];
    if max.map_or(true, |max| min + 1 <= max) {
        values.push(Candidate::new(zeros(min + 1), "Near-boundary length string"));
    }
    if let Some(max) = max.filter(|max| *max > min + 1 && *max <= MAX_MATERIALIZED_LENGTH) {
        values.push(Candidate::new(zeros(max), "Maximum length string"));
    }
    values
}

/// Base item values: `count` repetitions of the item base, or `count`
/// distinct item values under `uniqueItems`.
pub(crate) fn filled_array(schema: &JsonObject, count: u64) -> Option<Vec<JsonValue>> {
    if count == 0 {
        return Some(Vec::new());
    }
    let items = schema
        .get("items")
        .cloned()
        .unwrap_or_else(|| JsonValue::Object(JsonObject::new()));
    let item_values = positive_values(&items);
    let unique = schema.get("uniqueItems").and_then(JsonValue::as_bool) == Some(true);
    if unique {
        let distinct: Vec<JsonValue> = item_values
            .into_iter()
            .map(|candidate| candidate.value)
            .take(count as usize)
            .collect();
        (distinct.len() as u64 == count).then_some(distinct)
    } else {
        let base = item_values.into_iter().next()?.value;
        Some(vec![base; count as usize])
    }
}

fn array_values(schema: &JsonObject) -> Vec<Candidate> {
    let (min, max) = length_bounds(schema, "minItems", "maxItems");
    let mut length = min.max(1);
    if let Some(max) = max {
        if max < min {
            return Vec::new();
        }
        length = length.min(max);
    }
    if length > MAX_MATERIALIZED_LENGTH {
        return Vec::new();
    }
    let Some(base) = filled_array(schema, length) else {
        return Vec::new();
    };
    let mut values = vec![Candidate::new(JsonValue::Array(base), DEFAULT_POSITIVE)];
    if let Some(max) = max.filter(|max| *max > length && *max - length <= MAX_ITEMS_VARIANT_SPAN) {
        if let Some(longest) = filled_array(schema, max) {
            values.push(Candidate::new(JsonValue::Array(longest), "Maximum items array"));
        }
    }
    values
}

/// Property values at base, in declaration order. `None` when a required
/// property has no base value.
pub(crate) fn object_base(schema: &JsonObject, skip: Option<&str>) -> Option<JsonObject> {
    let forbidden = forbidden_keys(schema);
    let required = required_keys(schema);
    let mut base = JsonObject::new();
    if let Some(JsonValue::Object(properties)) = schema.get("properties") {
        for (name, property) in properties {
            if forbidden.contains(name) || Some(name.as_str()) == skip {
                continue;
            }
            match base_value(property) {
                Some(value) => {
                    base.insert(name.clone(), value);
                }
                None if required.contains(name) => return None,
                None => {}
            }
        }
    }
    for name in required {
        if Some(name.as_str()) != skip && !base.contains_key(&name) {
            base.insert(name, JsonValue::String(String::new()));
        }
    }
    Some(base)
}

fn object_values(schema: &JsonObject) -> Vec<Candidate> {
    let Some(base) = object_base(schema, None) else {
        return Vec::new();
    };
    let mut values = vec![Candidate::new(JsonValue::Object(base.clone()), DEFAULT_POSITIVE)];
    if let Some(JsonValue::Object(properties)) = schema.get("properties") {
        for (name, property) in properties {
            if !base.contains_key(name) {
                continue;
            }
            for variant in positive_values(property).into_iter().skip(1) {
                let mut object = base.clone();
                object.insert(name.clone(), variant.value);
                values.push(Candidate::new(JsonValue::Object(object), variant.description));
            }
        }
    }
    let required = required_keys(schema);
    let mut remaining = base;
    let optional: Vec<String> = remaining
        .keys()
        .filter(|name| !required.contains(name))
        .cloned()
        .collect();
    for name in optional.iter().rev() {
        remaining.shift_remove(name);
        values.push(Candidate::new(
            JsonValue::Object(remaining.clone()),
            format!("Missing optional property: {name}"),
        ));
    }
    values
}
