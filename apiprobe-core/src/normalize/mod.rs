//! Canonical schema rewriting ahead of generation.
//!
//! The rewrite is bottom-up and never fails: keyword combinations it does not
//! understand are copied through unchanged.

use log::debug;
use serde_json::{json, Value as JsonValue};

use crate::operation::{ParameterLocation, SpecDialect};
use crate::JsonObject;

mod pattern;

pub(crate) use pattern::is_escaped;

/// Keywords holding a single subschema (or, for `items`, a list of them).
const SCHEMA_KEYWORDS: [&str; 11] = [
    "items",
    "additionalItems",
    "additionalProperties",
    "not",
    "contains",
    "propertyNames",
    "if",
    "then",
    "else",
    "unevaluatedItems",
    "unevaluatedProperties",
];

/// Keywords holding a list of subschemas.
const SCHEMA_LIST_KEYWORDS: [&str; 4] = ["allOf", "anyOf", "oneOf", "prefixItems"];

/// Keywords holding a name -> subschema map.
const SCHEMA_MAP_KEYWORDS: [&str; 5] = [
    "properties",
    "patternProperties",
    "dependentSchemas",
    "$defs",
    "definitions",
];

/// Which side of the exchange the schema describes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Target {
    /// Request data: `readOnly` properties must not be sent.
    Request,
    /// Response data: `writeOnly` properties must not be returned.
    Response,
}

impl Target {
    fn excluded_flags(self) -> &'static [&'static str] {
        match self {
            Target::Request => &["readOnly"],
            Target::Response => &["writeOnly", "x-writeOnly"],
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct NormalizeOptions {
    pub dialect: SpecDialect,
    pub target: Target,
    /// Fold `minLength`/`maxLength` into single-atom patterns.
    pub fold_lengths: bool,
    /// Parameter location of the top-level schema, `None` for bodies.
    pub location: Option<ParameterLocation>,
}

impl NormalizeOptions {
    pub fn request(dialect: SpecDialect) -> Self {
        Self {
            dialect,
            target: Target::Request,
            fold_lengths: false,
            location: None,
        }
    }

    pub fn response(dialect: SpecDialect) -> Self {
        Self {
            target: Target::Response,
            ..Self::request(dialect)
        }
    }

    pub fn with_fold_lengths(mut self, fold_lengths: bool) -> Self {
        self.fold_lengths = fold_lengths;
        self
    }

    pub fn for_location(mut self, location: Option<ParameterLocation>) -> Self {
        self.location = location;
        self
    }
}

/// Rewrites `schema` into the canonical form the generators reason about.
///
/// `normalize(&normalize(s, o), o) == normalize(s, o)` for every input.
pub fn normalize(schema: &JsonValue, options: &NormalizeOptions) -> JsonValue {
    let mut schema = schema.clone();
    if options.location == Some(ParameterLocation::Path) {
        if let JsonValue::Object(map) = &mut schema {
            require_non_empty_segment(map);
        }
    }
    normalize_node(&schema, options)
}

fn normalize_node(schema: &JsonValue, options: &NormalizeOptions) -> JsonValue {
    let JsonValue::Object(map) = schema else {
        return schema.clone();
    };
    let mut node = JsonObject::with_capacity(map.len());
    for (key, value) in map {
        let key_str = key.as_str();
        let normalized = if SCHEMA_KEYWORDS.contains(&key_str) {
            match value {
                JsonValue::Array(items) => JsonValue::Array(
                    items
                        .iter()
                        .map(|item| normalize_node(item, options))
                        .collect(),
                ),
                other => normalize_node(other, options),
            }
        } else if SCHEMA_LIST_KEYWORDS.contains(&key_str) {
            match value {
                JsonValue::Array(items) => JsonValue::Array(
                    items
                        .iter()
                        .map(|item| normalize_node(item, options))
                        .collect(),
                ),
                other => other.clone(),
            }
        } else if SCHEMA_MAP_KEYWORDS.contains(&key_str) {
            match value {
                JsonValue::Object(children) => JsonValue::Object(
                    children
                        .iter()
                        .map(|(name, child)| (name.clone(), normalize_node(child, options)))
                        .collect(),
                ),
                other => other.clone(),
            }
        } else {
            value.clone()
        };
        node.insert(key.clone(), normalized);
    }

    if options.dialect == SpecDialect::Swagger2 {
        rewrite_file_type(&mut node);
    }
    rewrite_exclusive_bounds(&mut node);
    exclude_flagged_properties(&mut node, options.target.excluded_flags());
    if options.fold_lengths {
        fold_lengths(&mut node);
    }
    wrap_nullable(node, options.dialect.nullable_keyword())
}

fn wrap_nullable(mut node: JsonObject, keyword: &str) -> JsonValue {
    match node.remove(keyword) {
        Some(JsonValue::Bool(true)) => {
            let mut null = JsonObject::new();
            null.insert("type".to_string(), JsonValue::String("null".to_string()));
            let mut wrapper = JsonObject::new();
            wrapper.insert(
                "anyOf".to_string(),
                JsonValue::Array(vec![JsonValue::Object(node), JsonValue::Object(null)]),
            );
            JsonValue::Object(wrapper)
        }
        Some(JsonValue::Bool(false)) => JsonValue::Object(node),
        Some(other) => {
            // Not a boolean marker; keep it as an unknown keyword.
            node.insert(keyword.to_string(), other);
            JsonValue::Object(node)
        }
        None => JsonValue::Object(node),
    }
}

fn rewrite_file_type(node: &mut JsonObject) {
    if node.get("type").and_then(JsonValue::as_str) == Some("file") {
        node.insert("type".to_string(), JsonValue::String("string".to_string()));
        node.insert("format".to_string(), JsonValue::String("binary".to_string()));
    }
}

/// Draft-4 boolean exclusivity becomes the numeric form.
fn rewrite_exclusive_bounds(node: &mut JsonObject) {
    for (exclusive, bound) in [
        ("exclusiveMinimum", "minimum"),
        ("exclusiveMaximum", "maximum"),
    ] {
        match node.get(exclusive) {
            Some(JsonValue::Bool(true)) => {
                if let Some(value) = node.get(bound).filter(|value| value.is_number()).cloned() {
                    node.remove(bound);
                    node.insert(exclusive.to_string(), value);
                }
            }
            Some(JsonValue::Bool(false)) => {
                node.remove(exclusive);
            }
            _ => {}
        }
    }
}

fn is_flagged(schema: &JsonValue, flags: &[&str]) -> bool {
    let Some(map) = schema.as_object() else {
        return false;
    };
    if flags
        .iter()
        .any(|flag| map.get(*flag).and_then(JsonValue::as_bool) == Some(true))
    {
        return true;
    }
    // A nullable wrapper carries the flag on its first branch.
    map.get("anyOf")
        .and_then(JsonValue::as_array)
        .is_some_and(|branches| branches.iter().any(|branch| is_flagged(branch, flags)))
}

fn exclude_flagged_properties(node: &mut JsonObject, flags: &[&str]) {
    let excluded: Vec<String> = match node.get("properties") {
        Some(JsonValue::Object(properties)) => properties
            .iter()
            .filter(|(_, schema)| is_flagged(schema, flags))
            .map(|(name, _)| name.clone())
            .collect(),
        _ => return,
    };
    if excluded.is_empty() {
        return;
    }
    let Some(required) = exclusion_list(node) else {
        debug!("neither `not` nor `allOf` can carry the exclusion; leaving flagged properties untouched");
        return;
    };
    for name in &excluded {
        if !required.iter().any(|value| value.as_str() == Some(name.as_str())) {
            required.push(JsonValue::String(name.clone()));
        }
    }
    let mut drop_required = false;
    if let Some(JsonValue::Array(required)) = node.get_mut("required") {
        required.retain(|value| {
            value
                .as_str()
                .map(|name| !excluded.iter().any(|excluded| excluded == name))
                .unwrap_or(true)
        });
        drop_required = required.is_empty();
    }
    if drop_required {
        node.remove("required");
    }
}

/// The `required` list of the `not` forbidding flagged properties. A `not`
/// holding only `required` is extended in place; otherwise the exclusion
/// lives in an `allOf` branch of its own.
fn exclusion_list(node: &mut JsonObject) -> Option<&mut Vec<JsonValue>> {
    let plain_not = match node.get("not") {
        None => true,
        Some(JsonValue::Object(not)) => not.keys().all(|key| key == "required"),
        Some(_) => false,
    };
    let not = if plain_not {
        node.entry("not".to_string())
            .or_insert_with(|| JsonValue::Object(JsonObject::new()))
    } else {
        let JsonValue::Array(branches) = node
            .entry("allOf".to_string())
            .or_insert_with(|| JsonValue::Array(Vec::new()))
        else {
            return None;
        };
        let index = match branches.iter().position(is_exclusion_branch) {
            Some(index) => index,
            None => {
                branches.push(json!({"not": {"required": []}}));
                branches.len() - 1
            }
        };
        branches[index].get_mut("not")?
    };
    not.as_object_mut()?
        .entry("required".to_string())
        .or_insert_with(|| JsonValue::Array(Vec::new()))
        .as_array_mut()
}

fn is_exclusion_branch(branch: &JsonValue) -> bool {
    let Some(branch) = branch.as_object() else {
        return false;
    };
    branch.len() == 1
        && branch
            .get("not")
            .and_then(JsonValue::as_object)
            .is_some_and(|not| not.len() == 1 && not.get("required").is_some_and(JsonValue::is_array))
}

fn fold_lengths(node: &mut JsonObject) {
    let Some(pattern) = node.get("pattern").and_then(JsonValue::as_str) else {
        return;
    };
    let min_length = node.get("minLength").and_then(JsonValue::as_u64);
    let max_length = node.get("maxLength").and_then(JsonValue::as_u64);
    if let Some(folded) = pattern::fold_length_bounds(pattern, min_length, max_length) {
        node.insert("pattern".to_string(), JsonValue::String(folded));
        node.remove("minLength");
        node.remove("maxLength");
    }
}

/// Path segments are never empty; a string path parameter without its own
/// lower bound or pattern gets `minLength: 1`.
fn require_non_empty_segment(map: &mut JsonObject) {
    let is_string = map.get("type").and_then(JsonValue::as_str) == Some("string");
    if is_string && !map.contains_key("minLength") && !map.contains_key("pattern") {
        map.insert("minLength".to_string(), JsonValue::from(1));
    }
}

#[cfg(test)]
#[path = "../../tests/internal/normalize_unit_tests.rs"]
mod tests;
