//! Reference expansion and shared JSON Schema helpers.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use jsonschema::{draft202012, Validator};
use log::debug;
use serde_json::Value as JsonValue;

use crate::JsonObject;

/// Reference prefixes resolved against the document definitions.
const REFERENCE_PREFIXES: [&str; 3] = ["#/definitions/", "#/components/schemas/", "#/$defs/"];

/// Keywords whose values are instance data, never schemas.
const DATA_KEYWORDS: [&str; 6] = ["const", "default", "enum", "example", "examples", "x-example"];

/// Handle of a definition node inside a [`SchemaArena`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(usize);

/// Errors raised while expanding references.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReferenceError {
    /// The reference does not name a known definition.
    Unresolvable(String),
    /// `$ref` is present but is not a string.
    Malformed(String),
}

impl fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceError::Unresolvable(reference) => {
                write!(f, "unresolvable reference '{reference}'")
            }
            ReferenceError::Malformed(value) => write!(f, "malformed reference {value}"),
        }
    }
}

impl std::error::Error for ReferenceError {}

/// Immutable definition nodes addressed by handle.
///
/// Expansion never hands out shared nodes: every `$ref` occurrence becomes a
/// fresh copy, and recursion is cut by an explicit depth counter.
#[derive(Clone, Debug, Default)]
pub struct SchemaArena {
    nodes: Vec<JsonValue>,
    names: HashMap<String, NodeId>,
}

impl SchemaArena {
    pub fn new(definitions: &JsonObject) -> Self {
        let mut arena = Self::default();
        for (name, schema) in definitions {
            let id = NodeId(arena.nodes.len());
            arena.nodes.push(schema.clone());
            arena.names.insert(name.clone(), id);
        }
        arena
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn lookup(&self, reference: &str) -> Result<NodeId, ReferenceError> {
        let name = REFERENCE_PREFIXES
            .iter()
            .find_map(|prefix| reference.strip_prefix(prefix))
            .ok_or_else(|| ReferenceError::Unresolvable(reference.to_string()))?;
        self.names
            .get(&decode_pointer_segment(name))
            .copied()
            .ok_or_else(|| ReferenceError::Unresolvable(reference.to_string()))
    }

    pub fn node(&self, id: NodeId) -> &JsonValue {
        &self.nodes[id.0]
    }

    /// Returns a reference-free copy of `schema`.
    ///
    /// References nested deeper than `max_depth` expand to the empty schema.
    pub fn expand(
        &self,
        schema: &JsonValue,
        max_depth: usize,
    ) -> Result<JsonValue, ReferenceError> {
        self.expand_at(schema, 0, max_depth)
    }

    fn expand_at(
        &self,
        schema: &JsonValue,
        depth: usize,
        max_depth: usize,
    ) -> Result<JsonValue, ReferenceError> {
        match schema {
            JsonValue::Object(map) => {
                if let Some(reference) = map.get("$ref") {
                    let reference = reference
                        .as_str()
                        .ok_or_else(|| ReferenceError::Malformed(reference.to_string()))?;
                    if depth >= max_depth {
                        debug!("reference '{reference}' exceeds depth {max_depth}; truncating");
                        return Ok(JsonValue::Object(JsonObject::new()));
                    }
                    let id = self.lookup(reference)?;
                    let mut expanded = self.expand_at(self.node(id), depth + 1, max_depth)?;
                    if let JsonValue::Object(target) = &mut expanded {
                        for (key, value) in map {
                            if key != "$ref" {
                                let child = self.expand_child(key, value, depth, max_depth)?;
                                target.insert(key.clone(), child);
                            }
                        }
                    }
                    return Ok(expanded);
                }
                let mut expanded = JsonObject::with_capacity(map.len());
                for (key, value) in map {
                    let child = self.expand_child(key, value, depth, max_depth)?;
                    expanded.insert(key.clone(), child);
                }
                Ok(JsonValue::Object(expanded))
            }
            JsonValue::Array(items) => items
                .iter()
                .map(|item| self.expand_at(item, depth, max_depth))
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            other => Ok(other.clone()),
        }
    }

    fn expand_child(
        &self,
        key: &str,
        value: &JsonValue,
        depth: usize,
        max_depth: usize,
    ) -> Result<JsonValue, ReferenceError> {
        if DATA_KEYWORDS.contains(&key) {
            Ok(value.clone())
        } else {
            self.expand_at(value, depth, max_depth)
        }
    }
}

/// Black-box validator for a single schema.
///
/// A schema the validator cannot compile accepts and rejects everything, so
/// callers degrade to passthrough instead of failing.
pub(crate) struct SchemaCheck {
    validator: Option<Validator>,
}

impl SchemaCheck {
    pub(crate) fn new(schema: &JsonValue) -> Self {
        let validator = match draft202012::new(schema) {
            Ok(validator) => Some(validator),
            Err(error) => {
                debug!("schema is not compilable, skipping validation: {error}");
                None
            }
        };
        Self { validator }
    }

    pub(crate) fn accepts(&self, value: &JsonValue) -> bool {
        self.validator
            .as_ref()
            .map(|validator| validator.is_valid(value))
            .unwrap_or(true)
    }

    pub(crate) fn rejects(&self, value: &JsonValue) -> bool {
        self.validator
            .as_ref()
            .map(|validator| !validator.is_valid(value))
            .unwrap_or(true)
    }
}

/// Types a schema explicitly allows, or `None` when it does not restrict types.
pub(crate) fn allowed_types(schema: &JsonObject) -> Option<BTreeSet<String>> {
    let mut types = BTreeSet::new();
    match schema.get("type") {
        Some(JsonValue::String(name)) => {
            types.insert(name.clone());
        }
        Some(JsonValue::Array(names)) => {
            for name in names {
                types.insert(name.as_str()?.to_string());
            }
        }
        Some(_) => return None,
        None => {
            let branches = schema
                .get("anyOf")
                .or_else(|| schema.get("oneOf"))
                .and_then(JsonValue::as_array)?;
            if branches.is_empty() {
                return None;
            }
            for branch in branches {
                types.extend(allowed_types(branch.as_object()?)?);
            }
        }
    }
    if types.contains("number") {
        types.insert("integer".to_string());
    }
    Some(types)
}

/// Declared `type`, or a type implied by type-specific keywords.
pub(crate) fn inferred_type(schema: &JsonObject) -> Option<&str> {
    if let Some(name) = schema.get("type").and_then(JsonValue::as_str) {
        return Some(name);
    }
    if schema.contains_key("properties") || schema.contains_key("additionalProperties") {
        Some("object")
    } else if schema.contains_key("items") || schema.contains_key("prefixItems") {
        Some("array")
    } else if ["minLength", "maxLength", "pattern"]
        .iter()
        .any(|key| schema.contains_key(*key))
    {
        Some("string")
    } else if ["minimum", "maximum", "exclusiveMinimum", "exclusiveMaximum", "multipleOf"]
        .iter()
        .any(|key| schema.contains_key(*key))
    {
        Some("number")
    } else {
        None
    }
}

/// Folds `allOf` members into their parent schema.
pub(crate) fn merge_all_of(schema: &JsonObject) -> JsonObject {
    let Some(JsonValue::Array(members)) = schema.get("allOf") else {
        return schema.clone();
    };
    let mut merged = schema.clone();
    merged.remove("allOf");
    for member in members {
        if let Some(member) = member.as_object() {
            merged = merge_object_schema(&merged, &merge_all_of(member));
        }
    }
    merged
}

fn merge_object_schema(base: &JsonObject, branch: &JsonObject) -> JsonObject {
    let mut merged = base.clone();
    for (key, value) in branch {
        match key.as_str() {
            "properties" => {
                if let (Some(JsonValue::Object(base_props)), JsonValue::Object(branch_props)) =
                    (merged.get_mut("properties"), value)
                {
                    for (prop_key, prop_value) in branch_props {
                        base_props.insert(prop_key.clone(), prop_value.clone());
                    }
                } else {
                    merged.insert(key.clone(), value.clone());
                }
            }
            "required" => {
                if let (Some(JsonValue::Array(base_required)), JsonValue::Array(branch_required)) =
                    (merged.get_mut("required"), value)
                {
                    let mut seen = HashSet::new();
                    let mut combined = Vec::new();
                    for item in base_required.iter().chain(branch_required.iter()) {
                        if let Some(value) = item.as_str() {
                            if seen.insert(value.to_string()) {
                                combined.push(JsonValue::String(value.to_string()));
                            }
                        }
                    }
                    *base_required = combined;
                } else {
                    merged.insert(key.clone(), value.clone());
                }
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

/// Branches of `oneOf`/`anyOf` or a `type` array, each merged with the
/// parent's remaining keywords.
pub(crate) fn union_branches(schema: &JsonObject) -> Option<Vec<JsonObject>> {
    for keyword in ["oneOf", "anyOf"] {
        if let Some(JsonValue::Array(members)) = schema.get(keyword) {
            let mut base = schema.clone();
            base.remove(keyword);
            let branches = members
                .iter()
                .filter_map(JsonValue::as_object)
                .map(|member| merge_object_schema(&base, &merge_all_of(member)))
                .collect::<Vec<_>>();
            return Some(branches);
        }
    }
    let JsonValue::Array(types) = schema.get("type")? else {
        return None;
    };
    let mut branches = Vec::with_capacity(types.len());
    for value in types {
        let mut branch = schema.clone();
        branch.insert("type".to_string(), JsonValue::String(value.as_str()?.to_string()));
        branches.push(branch);
    }
    Some(branches)
}

/// Property names listed under `required`.
pub(crate) fn required_keys(schema: &JsonObject) -> Vec<String> {
    string_list(schema.get("required"))
}

/// Property names excluded through `not.required`.
pub(crate) fn forbidden_keys(schema: &JsonObject) -> HashSet<String> {
    string_list(schema.get("not").and_then(|not| not.get("required")))
        .into_iter()
        .collect()
}

fn string_list(value: Option<&JsonValue>) -> Vec<String> {
    value
        .and_then(JsonValue::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn decode_pointer_segment(segment: &str) -> String {
    let mut decoded = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(ch) = chars.next() {
        if ch == '~' {
            match chars.next() {
                Some('0') => decoded.push('~'),
                Some('1') => decoded.push('/'),
                Some(other) => {
                    decoded.push('~');
                    decoded.push(other);
                }
                None => decoded.push('~'),
            }
        } else {
            decoded.push(ch);
        }
    }
    decoded
}

/// Resolves an RFC 6901 pointer (`""` or `/a/0/b`) inside `root`.
pub(crate) fn resolve_pointer<'a>(root: &'a JsonValue, pointer: &str) -> Option<&'a JsonValue> {
    if pointer.is_empty() {
        return Some(root);
    }
    if !pointer.starts_with('/') {
        return None;
    }
    let mut current = root;
    for segment in pointer.split('/').skip(1) {
        let decoded = decode_pointer_segment(segment);
        match current {
            JsonValue::Object(map) => {
                current = map.get(&decoded)?;
            }
            JsonValue::Array(items) => {
                let index = decoded.parse::<usize>().ok()?;
                current = items.get(index)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

#[cfg(test)]
#[path = "../tests/internal/schema_unit_tests.rs"]
mod tests;
