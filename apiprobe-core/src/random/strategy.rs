//! Proptest strategies producing values a normalized schema accepts.

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use regex_syntax::hir::Hir;
use regex_syntax::ParserBuilder;
use serde_json::Value as JsonValue;

use crate::normalize::is_escaped;
use crate::schema::{forbidden_keys, inferred_type, merge_all_of, required_keys, union_branches};
use crate::JsonObject;

/// Extra characters allowed above `minLength` when no `maxLength` is declared.
const DEFAULT_STRING_SPAN: usize = 16;

/// Extra items allowed above `minItems` when no `maxItems` is declared.
const DEFAULT_ITEMS_SPAN: usize = 4;

/// Range used for numbers without a bound on one side.
const DEFAULT_NUMBER_SPAN: f64 = 1_000_000.0;

/// Patterns of a set of schemas, parsed once for generation.
#[derive(Clone, Debug, Default)]
pub struct PatternIndex {
    patterns: HashMap<String, Result<Hir, String>>,
}

impl PatternIndex {
    pub fn from_schemas<'a>(schemas: impl IntoIterator<Item = &'a JsonValue>) -> Self {
        let mut found = HashSet::new();
        for schema in schemas {
            collect_patterns(schema, &mut found);
        }
        let patterns = found
            .into_iter()
            .map(|pattern| {
                let compiled = compile_pattern(&pattern);
                (pattern, compiled)
            })
            .collect();
        Self { patterns }
    }

    fn pattern(&self, pattern: &str) -> Result<&Hir, String> {
        match self.patterns.get(pattern) {
            Some(Ok(hir)) => Ok(hir),
            Some(Err(reason)) => Err(reason.clone()),
            None => Err(format!("pattern '{pattern}' was not compiled")),
        }
    }
}

fn collect_patterns(value: &JsonValue, found: &mut HashSet<String>) {
    match value {
        JsonValue::Object(map) => {
            if let Some(JsonValue::String(pattern)) = map.get("pattern") {
                found.insert(pattern.clone());
            }
            for child in map.values() {
                collect_patterns(child, found);
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                collect_patterns(item, found);
            }
        }
        _ => {}
    }
}

/// Strips the anchors: a generated string must match as a whole anyway.
fn compile_pattern(pattern: &str) -> Result<Hir, String> {
    if has_boundary_escape(pattern) {
        return Err("word boundary escapes are unsupported for string generation".to_string());
    }
    let bytes = pattern.as_bytes();
    let start = usize::from(bytes.first() == Some(&b'^'));
    let mut end = bytes.len();
    if end > start && bytes[end - 1] == b'$' && !is_escaped(bytes, end - 1) {
        end -= 1;
    }
    let hir = ParserBuilder::new()
        .build()
        .parse(&pattern[start..end])
        .map_err(|error| format!("pattern must be a valid regex: {error}"))?;
    proptest::string::string_regex_parsed(&hir)
        .map_err(|error| format!("pattern must be a valid regex: {error}"))?;
    Ok(hir)
}

fn has_boundary_escape(pattern: &str) -> bool {
    let bytes = pattern.as_bytes();
    let mut index = 0;
    while index + 1 < bytes.len() {
        if bytes[index] == b'\\' {
            if matches!(bytes[index + 1], b'b' | b'B' | b'A' | b'Z' | b'z' | b'G') {
                return true;
            }
            index += 2;
        } else {
            index += 1;
        }
    }
    false
}

/// Builds a strategy for `schema`; the error names what cannot be generated.
pub fn value_strategy(
    schema: &JsonValue,
    patterns: &PatternIndex,
) -> Result<BoxedStrategy<JsonValue>, String> {
    let map = match schema {
        JsonValue::Bool(true) => return Ok(any_scalar()),
        JsonValue::Bool(false) => return Err("schema accepts no value".to_string()),
        JsonValue::Object(map) => map,
        other => return Err(format!("schema must be an object, got {other}")),
    };
    let map = merge_all_of(map);

    if let Some(value) = map.get("const") {
        return Ok(Just(value.clone()).boxed());
    }
    if let Some(JsonValue::Array(members)) = map.get("enum") {
        if members.is_empty() {
            return Err("enum must include at least one value".to_string());
        }
        return Ok(proptest::sample::select(members.clone()).boxed());
    }
    if let Some(branches) = union_branches(&map) {
        let strategies = branches
            .into_iter()
            .filter_map(|branch| value_strategy(&JsonValue::Object(branch), patterns).ok())
            .collect::<Vec<_>>();
        if strategies.is_empty() {
            return Err("no union branch can be generated".to_string());
        }
        return Ok(proptest::strategy::Union::new(strategies).boxed());
    }

    match inferred_type(&map) {
        Some("string") => string_strategy(&map, patterns),
        Some("integer") => integer_strategy(&map),
        Some("number") => number_strategy(&map),
        Some("boolean") => Ok(any::<bool>().prop_map(JsonValue::from).boxed()),
        Some("null") => Ok(Just(JsonValue::Null).boxed()),
        Some("array") => array_strategy(&map, patterns),
        Some("object") => object_strategy(&map, patterns),
        Some(other) => Err(format!("unsupported schema type '{other}'")),
        None => Ok(any_scalar()),
    }
}

/// Values for schemas that constrain nothing.
fn any_scalar() -> BoxedStrategy<JsonValue> {
    prop_oneof![
        Just(JsonValue::Null),
        any::<bool>().prop_map(JsonValue::from),
        (-1000i64..=1000).prop_map(JsonValue::from),
        printable(0, 8),
    ]
    .boxed()
}

fn printable(min: usize, max: usize) -> BoxedStrategy<JsonValue> {
    proptest::collection::vec(proptest::char::range(' ', '~'), min..=max)
        .prop_map(|chars| JsonValue::String(chars.into_iter().collect()))
        .boxed()
}

fn length_bounds(
    schema: &JsonObject,
    min_key: &str,
    max_key: &str,
    span: usize,
) -> Result<(usize, usize), String> {
    let min = schema.get(min_key).and_then(JsonValue::as_u64).unwrap_or(0) as usize;
    let max = schema
        .get(max_key)
        .and_then(JsonValue::as_u64)
        .map(|max| max as usize)
        .unwrap_or(min + span);
    if max < min {
        return Err(format!("{max_key} must be >= {min_key}"));
    }
    Ok((min, max))
}

fn string_strategy(
    schema: &JsonObject,
    patterns: &PatternIndex,
) -> Result<BoxedStrategy<JsonValue>, String> {
    let (min, max) = length_bounds(schema, "minLength", "maxLength", DEFAULT_STRING_SPAN)?;
    let Some(pattern) = schema.get("pattern").and_then(JsonValue::as_str) else {
        return Ok(printable(min, max));
    };
    let hir = patterns.pattern(pattern)?;
    let strategy = proptest::string::string_regex_parsed(hir)
        .map_err(|error| format!("pattern must be a valid regex: {error}"))?;
    Ok(strategy
        .prop_filter("string length out of bounds", move |value| {
            let length = value.chars().count();
            length >= min && length <= max
        })
        .prop_map(JsonValue::String)
        .boxed())
}

/// Inclusive bounds with exclusive ones tightened by `step`.
fn inclusive_bounds(schema: &JsonObject, step: f64) -> (Option<f64>, Option<f64>) {
    let minimum = match schema.get("exclusiveMinimum").and_then(JsonValue::as_f64) {
        Some(bound) => Some(bound + step),
        None => schema.get("minimum").and_then(JsonValue::as_f64),
    };
    let maximum = match schema.get("exclusiveMaximum").and_then(JsonValue::as_f64) {
        Some(bound) => Some(bound - step),
        None => schema.get("maximum").and_then(JsonValue::as_f64),
    };
    (minimum, maximum)
}

fn integer_strategy(schema: &JsonObject) -> Result<BoxedStrategy<JsonValue>, String> {
    let step = schema
        .get("multipleOf")
        .and_then(JsonValue::as_f64)
        .filter(|step| *step > 0.0)
        .unwrap_or(1.0);
    let (minimum, maximum) = inclusive_bounds(schema, 1.0);
    let (low, high) = span(minimum, maximum);
    if step == 1.0 {
        let (low, high) = (low.ceil() as i64, high.floor() as i64);
        if high < low {
            return Err("maximum must be >= minimum".to_string());
        }
        return Ok((low..=high).prop_map(JsonValue::from).boxed());
    }
    multiples(low, high, step, true)
}

fn number_strategy(schema: &JsonObject) -> Result<BoxedStrategy<JsonValue>, String> {
    if let Some(step) = schema
        .get("multipleOf")
        .and_then(JsonValue::as_f64)
        .filter(|step| *step > 0.0)
    {
        let (minimum, maximum) = inclusive_bounds(schema, step);
        let (low, high) = span(minimum, maximum);
        return multiples(low, high, step, false);
    }
    let exclusive_min = schema.get("exclusiveMinimum").and_then(JsonValue::as_f64);
    let exclusive_max = schema.get("exclusiveMaximum").and_then(JsonValue::as_f64);
    let minimum = exclusive_min.or_else(|| schema.get("minimum").and_then(JsonValue::as_f64));
    let maximum = exclusive_max.or_else(|| schema.get("maximum").and_then(JsonValue::as_f64));
    let (low, high) = span(minimum, maximum);
    if high < low {
        return Err("maximum must be >= minimum".to_string());
    }
    Ok((low..=high)
        .prop_filter("number on an exclusive bound", move |value| {
            exclusive_min.map_or(true, |bound| *value > bound)
                && exclusive_max.map_or(true, |bound| *value < bound)
        })
        .prop_map(JsonValue::from)
        .boxed())
}

/// Closes open numeric ranges with a fixed span around the known bound.
fn span(minimum: Option<f64>, maximum: Option<f64>) -> (f64, f64) {
    match (minimum, maximum) {
        (Some(low), Some(high)) => (low, high),
        (Some(low), None) => (low, low + DEFAULT_NUMBER_SPAN),
        (None, Some(high)) => (high - DEFAULT_NUMBER_SPAN, high),
        (None, None) => (-DEFAULT_NUMBER_SPAN, DEFAULT_NUMBER_SPAN),
    }
}

fn multiples(low: f64, high: f64, step: f64, integral: bool) -> Result<BoxedStrategy<JsonValue>, String> {
    let first = (low / step).ceil() as i64;
    let last = (high / step).floor() as i64;
    if last < first {
        return Err(format!("no multiple of {step} lies within the bounds"));
    }
    Ok((first..=last)
        .prop_map(move |factor| {
            let value = factor as f64 * step;
            if integral && value.fract() == 0.0 {
                JsonValue::from(value as i64)
            } else {
                JsonValue::from(value)
            }
        })
        .boxed())
}

fn array_strategy(
    schema: &JsonObject,
    patterns: &PatternIndex,
) -> Result<BoxedStrategy<JsonValue>, String> {
    let (min, max) = length_bounds(schema, "minItems", "maxItems", DEFAULT_ITEMS_SPAN)?;
    let items = match schema.get("items") {
        Some(items) => value_strategy(items, patterns)?,
        None => any_scalar(),
    };
    let unique = schema.get("uniqueItems").and_then(JsonValue::as_bool) == Some(true);
    let strategy = proptest::collection::vec(items, min..=max);
    if unique {
        return Ok(strategy
            .prop_filter("items must be unique", |items| {
                let mut seen = HashSet::new();
                items.iter().all(|item| seen.insert(item.to_string()))
            })
            .prop_map(JsonValue::Array)
            .boxed());
    }
    Ok(strategy.prop_map(JsonValue::Array).boxed())
}

fn object_strategy(
    schema: &JsonObject,
    patterns: &PatternIndex,
) -> Result<BoxedStrategy<JsonValue>, String> {
    let required = required_keys(schema);
    let forbidden = forbidden_keys(schema);
    let mut entries: Vec<BoxedStrategy<Option<(String, JsonValue)>>> = Vec::new();
    if let Some(JsonValue::Object(properties)) = schema.get("properties") {
        for (name, property) in properties {
            if forbidden.contains(name) {
                continue;
            }
            let is_required = required.contains(name);
            let strategy = match value_strategy(property, patterns) {
                Ok(strategy) => strategy,
                Err(reason) if is_required => {
                    return Err(format!("required property '{name}': {reason}"))
                }
                Err(_) => continue,
            };
            let key = name.clone();
            let entry = strategy.prop_map(move |value| Some((key.clone(), value)));
            entries.push(if is_required {
                entry.boxed()
            } else {
                prop_oneof![Just(None), entry].boxed()
            });
        }
    }
    for name in required {
        let declared = schema
            .get("properties")
            .and_then(|properties| properties.get(&name))
            .is_some();
        if !declared {
            entries.push(any_scalar().prop_map(move |value| Some((name.clone(), value))).boxed());
        }
    }
    Ok(entries
        .prop_map(|entries| JsonValue::Object(entries.into_iter().flatten().collect()))
        .boxed())
}
