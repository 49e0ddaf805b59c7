//! Ordered table of negative mutations.

use std::collections::HashSet;
use std::fmt;

use log::debug;
use serde_json::Value as JsonValue;

use super::patterns::non_matching;
use super::values::{
    base_value, filled_array, number, numeric_bounds, object_base, MAX_MATERIALIZED_LENGTH,
};
use super::Candidate;
use crate::operation::ParameterLocation;
use crate::schema::{allowed_types, forbidden_keys, merge_all_of, required_keys, SchemaCheck};
use crate::JsonObject;

/// Arrays longer than this are never built for a `maxItems` violation.
const MAX_ITEMS_VIOLATION: u64 = 1_000;

const UNEXPECTED_PROPERTY: &str = "x-unknown-property";

/// Violated-constraint kinds, in table order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MutationKind {
    TypeMismatch,
    Enum,
    Minimum,
    Maximum,
    MaxLength,
    MinLength,
    Pattern,
    MissingProperty,
    AdditionalProperty,
    MinItems,
    MaxItems,
    UniqueItems,
    ArrayItems,
    ObjectProperties,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationKind::TypeMismatch => "type_mismatch",
            MutationKind::Enum => "enum",
            MutationKind::Minimum => "minimum",
            MutationKind::Maximum => "maximum",
            MutationKind::MaxLength => "max_length",
            MutationKind::MinLength => "min_length",
            MutationKind::Pattern => "pattern",
            MutationKind::MissingProperty => "missing_property",
            MutationKind::AdditionalProperty => "additional_property",
            MutationKind::MinItems => "min_items",
            MutationKind::MaxItems => "max_items",
            MutationKind::UniqueItems => "unique_items",
            MutationKind::ArrayItems => "array_items",
            MutationKind::ObjectProperties => "object_properties",
        };
        f.write_str(name)
    }
}

/// What a mutation may consult while building values.
pub(crate) struct MutationContext<'a> {
    pub(crate) table: &'a MutationTable,
    /// Parameter location, `None` for bodies.
    pub(crate) location: Option<ParameterLocation>,
}

impl MutationContext<'_> {
    /// Every negative value of `schema`, in table order, each rejected by it.
    pub(crate) fn negatives(&self, schema: &JsonValue) -> Vec<Candidate> {
        let JsonValue::Object(map) = schema else {
            return Vec::new();
        };
        let merged = merge_all_of(map);
        let check = SchemaCheck::new(schema);
        let mut seen = HashSet::new();
        let mut negatives = Vec::new();
        for mutation in &self.table.mutations {
            if !(mutation.applies)(&merged) {
                continue;
            }
            for candidate in (mutation.mutate)(self, &merged) {
                if !check.rejects(&candidate.value) {
                    debug!(
                        "{} candidate {} is accepted by the schema; skipping",
                        mutation.kind, candidate.value
                    );
                    continue;
                }
                if seen.insert(candidate.value.to_string()) {
                    negatives.push(candidate);
                }
            }
        }
        negatives
    }
}

type Applies = fn(&JsonObject) -> bool;
type Mutate = fn(&MutationContext<'_>, &JsonObject) -> Vec<Candidate>;

/// One table entry: when it applies and how it builds violating values.
#[derive(Clone, Copy)]
pub struct Mutation {
    pub kind: MutationKind,
    applies: Applies,
    mutate: Mutate,
}

impl fmt::Debug for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation").field("kind", &self.kind).finish()
    }
}

/// Immutable, ordered mutation table handed to the coverage generator.
#[derive(Clone, Debug)]
pub struct MutationTable {
    mutations: Vec<Mutation>,
}

impl Default for MutationTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl MutationTable {
    pub fn standard() -> Self {
        let entry = |kind, applies: Applies, mutate: Mutate| Mutation {
            kind,
            applies,
            mutate,
        };
        Self {
            mutations: vec![
                entry(MutationKind::TypeMismatch, has_type, type_mismatch),
                entry(MutationKind::Enum, has_enum, outside_enum),
                entry(MutationKind::Minimum, has_minimum, below_minimum),
                entry(MutationKind::Maximum, has_maximum, above_maximum),
                entry(MutationKind::MaxLength, has_max_length, above_max_length),
                entry(MutationKind::MinLength, has_min_length, below_min_length),
                entry(MutationKind::Pattern, has_pattern, pattern_mismatch),
                entry(MutationKind::MissingProperty, has_required, missing_property),
                entry(
                    MutationKind::AdditionalProperty,
                    forbids_additional,
                    additional_property,
                ),
                entry(MutationKind::MinItems, has_min_items, below_min_items),
                entry(MutationKind::MaxItems, has_max_items, above_max_items),
                entry(MutationKind::UniqueItems, has_unique_items, duplicate_items),
                entry(MutationKind::ArrayItems, has_items, nested_items),
                entry(MutationKind::ObjectProperties, has_properties, nested_properties),
            ],
        }
    }

    /// Keeps only the entries whose kind satisfies `keep`.
    pub fn filtered(&self, keep: impl Fn(MutationKind) -> bool) -> Self {
        Self {
            mutations: self
                .mutations
                .iter()
                .filter(|mutation| keep(mutation.kind))
                .copied()
                .collect(),
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = MutationKind> + '_ {
        self.mutations.iter().map(|mutation| mutation.kind)
    }
}

fn has_type(schema: &JsonObject) -> bool {
    allowed_types(schema).is_some()
}

fn type_mismatch(context: &MutationContext<'_>, schema: &JsonObject) -> Vec<Candidate> {
    let Some(allowed) = allowed_types(schema) else {
        return Vec::new();
    };
    let substitutes = [
        ("object", JsonValue::Object(JsonObject::new())),
        ("array", JsonValue::Array(vec![JsonValue::Null, JsonValue::Null])),
        ("string", JsonValue::String(String::new())),
        ("null", JsonValue::Null),
        ("boolean", JsonValue::Bool(false)),
        ("integer", JsonValue::from(0)),
    ];
    substitutes
        .into_iter()
        .filter(|(type_name, _)| !allowed.contains(*type_name))
        .filter(|(type_name, _)| match (context.location, *type_name) {
            (Some(_), "integer") => !allowed.contains("string"),
            (Some(ParameterLocation::Query), "object") => false,
            _ => true,
        })
        .map(|(_, value)| Candidate::new(value, "Incorrect type"))
        .collect()
}

fn has_enum(schema: &JsonObject) -> bool {
    schema.contains_key("const")
        || schema
            .get("enum")
            .and_then(JsonValue::as_array)
            .is_some_and(|members| !members.is_empty())
}

fn outside_enum(_: &MutationContext<'_>, schema: &JsonObject) -> Vec<Candidate> {
    let members: Vec<JsonValue> = match (schema.get("const"), schema.get("enum")) {
        (Some(value), _) => vec![value.clone()],
        (None, Some(JsonValue::Array(members))) => members.clone(),
        _ => return Vec::new(),
    };
    let strings: Vec<&str> = members.iter().filter_map(JsonValue::as_str).collect();
    let value = if let Some(longest) = strings.iter().max_by_key(|member| member.len()) {
        let mut value = format!("{longest}0");
        while strings.contains(&value.as_str()) {
            value.push('0');
        }
        JsonValue::String(value)
    } else if let Some(max) = members
        .iter()
        .filter_map(JsonValue::as_f64)
        .reduce(f64::max)
    {
        number(max + 1.0)
    } else {
        let has_true = members.contains(&JsonValue::Bool(true));
        let has_false = members.contains(&JsonValue::Bool(false));
        match (has_false, has_true) {
            (true, false) => JsonValue::Bool(true),
            (false, true) => JsonValue::Bool(false),
            _ => JsonValue::Null,
        }
    };
    vec![Candidate::new(value, "Invalid enum value")]
}

fn has_minimum(schema: &JsonObject) -> bool {
    numeric_bounds(schema).0.is_some()
}

fn below_minimum(_: &MutationContext<'_>, schema: &JsonObject) -> Vec<Candidate> {
    let value = match schema.get("exclusiveMinimum").and_then(JsonValue::as_f64) {
        Some(bound) => Some(bound),
        None => schema
            .get("minimum")
            .and_then(JsonValue::as_f64)
            .map(|bound| bound - 1.0),
    };
    value
        .map(|value| vec![Candidate::new(number(value), "Value smaller than minimum")])
        .unwrap_or_default()
}

fn has_maximum(schema: &JsonObject) -> bool {
    numeric_bounds(schema).1.is_some()
}

fn above_maximum(_: &MutationContext<'_>, schema: &JsonObject) -> Vec<Candidate> {
    let value = match schema.get("exclusiveMaximum").and_then(JsonValue::as_f64) {
        Some(bound) => Some(bound),
        None => schema
            .get("maximum")
            .and_then(JsonValue::as_f64)
            .map(|bound| bound + 1.0),
    };
    value
        .map(|value| vec![Candidate::new(number(value), "Value greater than maximum")])
        .unwrap_or_default()
}

fn has_max_length(schema: &JsonObject) -> bool {
    schema
        .get("maxLength")
        .and_then(JsonValue::as_u64)
        .is_some_and(|max| max < MAX_MATERIALIZED_LENGTH)
}

fn above_max_length(_: &MutationContext<'_>, schema: &JsonObject) -> Vec<Candidate> {
    let Some(max) = schema.get("maxLength").and_then(JsonValue::as_u64) else {
        return Vec::new();
    };
    vec![Candidate::new(
        JsonValue::String("0".repeat(max as usize + 1)),
        "String larger than maxLength",
    )]
}

fn has_min_length(schema: &JsonObject) -> bool {
    schema
        .get("minLength")
        .and_then(JsonValue::as_u64)
        .is_some_and(|min| min >= 1 && min <= MAX_MATERIALIZED_LENGTH)
}

fn below_min_length(_: &MutationContext<'_>, schema: &JsonObject) -> Vec<Candidate> {
    let Some(min) = schema.get("minLength").and_then(JsonValue::as_u64) else {
        return Vec::new();
    };
    vec![Candidate::new(
        JsonValue::String("0".repeat(min as usize - 1)),
        "String smaller than minLength",
    )]
}

fn has_pattern(schema: &JsonObject) -> bool {
    schema.get("pattern").is_some_and(JsonValue::is_string)
}

fn pattern_mismatch(_: &MutationContext<'_>, schema: &JsonObject) -> Vec<Candidate> {
    let Some(pattern) = schema.get("pattern").and_then(JsonValue::as_str) else {
        return Vec::new();
    };
    let length = schema
        .get("minLength")
        .and_then(JsonValue::as_u64)
        .unwrap_or(0)
        .clamp(1, MAX_MATERIALIZED_LENGTH);
    non_matching(pattern, length as usize)
        .map(|value| {
            vec![Candidate::new(
                JsonValue::String(value),
                "String not matching pattern",
            )]
        })
        .unwrap_or_default()
}

fn has_required(schema: &JsonObject) -> bool {
    !required_keys(schema).is_empty()
}

fn missing_property(_: &MutationContext<'_>, schema: &JsonObject) -> Vec<Candidate> {
    required_keys(schema)
        .into_iter()
        .filter_map(|name| {
            let others = object_base(schema, Some(name.as_str()))?;
            Some(Candidate::new(
                JsonValue::Object(others),
                format!("Missing required property: {name}"),
            ))
        })
        .collect()
}

fn forbids_additional(schema: &JsonObject) -> bool {
    schema.get("additionalProperties") == Some(&JsonValue::Bool(false))
}

fn additional_property(_: &MutationContext<'_>, schema: &JsonObject) -> Vec<Candidate> {
    let Some(mut base) = object_base(schema, None) else {
        return Vec::new();
    };
    base.insert(UNEXPECTED_PROPERTY.to_string(), JsonValue::from(42));
    vec![Candidate::new(
        JsonValue::Object(base),
        "Object with unexpected properties",
    )]
}

fn has_min_items(schema: &JsonObject) -> bool {
    schema
        .get("minItems")
        .and_then(JsonValue::as_u64)
        .is_some_and(|min| min >= 1 && min <= MAX_ITEMS_VIOLATION)
}

fn below_min_items(_: &MutationContext<'_>, schema: &JsonObject) -> Vec<Candidate> {
    let Some(min) = schema.get("minItems").and_then(JsonValue::as_u64) else {
        return Vec::new();
    };
    filled_array(schema, min - 1)
        .map(|items| {
            vec![Candidate::new(
                JsonValue::Array(items),
                "Array smaller than minItems",
            )]
        })
        .unwrap_or_default()
}

fn has_max_items(schema: &JsonObject) -> bool {
    schema
        .get("maxItems")
        .and_then(JsonValue::as_u64)
        .is_some_and(|max| max < MAX_ITEMS_VIOLATION)
}

fn above_max_items(_: &MutationContext<'_>, schema: &JsonObject) -> Vec<Candidate> {
    let Some(max) = schema.get("maxItems").and_then(JsonValue::as_u64) else {
        return Vec::new();
    };
    let item = item_base(schema);
    item.map(|item| {
        vec![Candidate::new(
            JsonValue::Array(vec![item; max as usize + 1]),
            "Array larger than maxItems",
        )]
    })
    .unwrap_or_default()
}

fn has_unique_items(schema: &JsonObject) -> bool {
    schema.get("uniqueItems") == Some(&JsonValue::Bool(true))
}

fn duplicate_items(_: &MutationContext<'_>, schema: &JsonObject) -> Vec<Candidate> {
    let min = schema
        .get("minItems")
        .and_then(JsonValue::as_u64)
        .unwrap_or(0)
        .max(2);
    let fits = schema
        .get("maxItems")
        .and_then(JsonValue::as_u64)
        .map_or(true, |max| min <= max);
    if !fits || min > MAX_ITEMS_VIOLATION {
        return Vec::new();
    }
    item_base(schema)
        .map(|item| {
            vec![Candidate::new(
                JsonValue::Array(vec![item; min as usize]),
                "Non-unique items",
            )]
        })
        .unwrap_or_default()
}

fn item_base(schema: &JsonObject) -> Option<JsonValue> {
    match schema.get("items") {
        Some(items) => base_value(items),
        None => Some(JsonValue::String(String::new())),
    }
}

fn has_items(schema: &JsonObject) -> bool {
    schema.get("items").is_some_and(JsonValue::is_object)
}

fn nested_items(context: &MutationContext<'_>, schema: &JsonObject) -> Vec<Candidate> {
    let Some(items) = schema.get("items") else {
        return Vec::new();
    };
    let length = schema
        .get("minItems")
        .and_then(JsonValue::as_u64)
        .unwrap_or(0)
        .max(1);
    if length > MAX_ITEMS_VIOLATION {
        return Vec::new();
    }
    let siblings = if length > 1 {
        match base_value(items) {
            Some(base) => vec![base; length as usize - 1],
            None => return Vec::new(),
        }
    } else {
        Vec::new()
    };
    context
        .negatives(items)
        .into_iter()
        .map(|candidate| {
            let mut array = vec![candidate.value];
            array.extend(siblings.iter().cloned());
            Candidate::new(JsonValue::Array(array), candidate.description)
        })
        .collect()
}

fn has_properties(schema: &JsonObject) -> bool {
    schema.get("properties").is_some_and(JsonValue::is_object)
}

fn nested_properties(context: &MutationContext<'_>, schema: &JsonObject) -> Vec<Candidate> {
    let Some(JsonValue::Object(properties)) = schema.get("properties") else {
        return Vec::new();
    };
    let forbidden = forbidden_keys(schema);
    let mut candidates = Vec::new();
    for (name, property) in properties {
        if forbidden.contains(name) {
            continue;
        }
        let Some(siblings) = object_base(schema, Some(name.as_str())) else {
            debug!("a required sibling of '{name}' has no base value; skipping its mutations");
            continue;
        };
        for candidate in context.negatives(property) {
            let mut object = siblings.clone();
            object.insert(name.clone(), candidate.value);
            candidates.push(Candidate::new(
                JsonValue::Object(object),
                candidate.description,
            ));
        }
    }
    candidates
}

#[cfg(test)]
#[path = "../../tests/internal/mutations_unit_tests.rs"]
mod tests;
