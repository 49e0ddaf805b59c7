use serde_json::Value as JsonValue;

use crate::JsonObject;

/// Shape a style function is chosen for, from the parameter's inferred type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueShape {
    Primitive,
    Array,
    Object,
}

impl ValueShape {
    pub(crate) fn from_type(type_name: Option<&str>) -> Self {
        match type_name {
            Some("array") => ValueShape::Array,
            Some("object") => ValueShape::Object,
            _ => ValueShape::Primitive,
        }
    }
}

/// One named rewrite of a single key inside a location map.
///
/// Every transform leaves the map untouched when its key is absent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Transform {
    /// Replace the value with its JSON text.
    ToJson { name: String },
    /// Coerce the value to its wire string.
    ToString { name: String },
    /// Drop the key.
    Nothing { name: String },
    /// `[a, b]` -> `a{delimiter}b`.
    Delimited { name: String, delimiter: String },
    /// `{k: v, k2: v2}` -> `k=v,k2=v2`.
    DelimitedObject { name: String },
    /// `{k: v, k2: v2}` -> `k,v,k2,v2`.
    CommaDelimitedObject { name: String },
    /// Merge the object's keys into the location map.
    ExtractedObject { name: String },
    /// `{k: v}` -> `name[k]=v`.
    DeepObject { name: String },
    Label {
        name: String,
        shape: ValueShape,
        explode: bool,
    },
    Matrix {
        name: String,
        shape: ValueShape,
        explode: bool,
    },
}

impl Transform {
    pub fn name(&self) -> &str {
        match self {
            Transform::ToJson { name }
            | Transform::ToString { name }
            | Transform::Nothing { name }
            | Transform::Delimited { name, .. }
            | Transform::DelimitedObject { name }
            | Transform::CommaDelimitedObject { name }
            | Transform::ExtractedObject { name }
            | Transform::DeepObject { name }
            | Transform::Label { name, .. }
            | Transform::Matrix { name, .. } => name,
        }
    }

    /// Applies the transform to `values` in place.
    pub fn apply(&self, values: &mut JsonObject) {
        let name = self.name();
        if !values.contains_key(name) {
            return;
        }
        match self {
            Transform::ToJson { .. } => {
                replace(values, name, |value| JsonValue::String(value.to_string()));
            }
            Transform::ToString { .. } => {
                replace(values, name, |value| JsonValue::String(wire_string(value)));
            }
            Transform::Nothing { .. } => {
                values.shift_remove(name);
            }
            Transform::Delimited { delimiter, .. } => {
                replace(values, name, |value| {
                    JsonValue::String(join_items(value, delimiter))
                });
            }
            Transform::DelimitedObject { .. } => {
                replace_object(values, name, |object| pairs(object, "=", ","));
            }
            Transform::CommaDelimitedObject { .. } => {
                replace_object(values, name, flattened);
            }
            Transform::ExtractedObject { .. } => {
                expand_object(values, name, |key| key.to_string());
            }
            Transform::DeepObject { .. } => {
                expand_object(values, name, |key| format!("{name}[{key}]"));
            }
            Transform::Label { shape, explode, .. } => {
                replace(values, name, |value| {
                    JsonValue::String(label(value, *shape, *explode))
                });
            }
            Transform::Matrix { shape, explode, .. } => {
                replace(values, name, |value| {
                    JsonValue::String(matrix(name, value, *shape, *explode))
                });
            }
        }
    }
}

/// Wire text of a value: strings verbatim, numbers and booleans as JSON,
/// `null`, arrays comma-joined element-wise and objects as compact JSON.
pub fn wire_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        JsonValue::Array(items) => items.iter().map(wire_string).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// Replaces every scalar leaf with its wire string, keeping the structure.
pub fn stringify_leaves(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::String(_) => value.clone(),
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(stringify_leaves).collect()),
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), stringify_leaves(value)))
                .collect(),
        ),
        other => JsonValue::String(other.to_string()),
    }
}

fn replace(values: &mut JsonObject, name: &str, f: impl FnOnce(&JsonValue) -> JsonValue) {
    if let Some(value) = values.get(name) {
        let replaced = f(value);
        values.insert(name.to_string(), replaced);
    }
}

fn replace_object(values: &mut JsonObject, name: &str, f: impl FnOnce(&JsonObject) -> String) {
    let rendered = match values.get(name) {
        Some(JsonValue::Object(object)) => f(object),
        Some(JsonValue::Null) => String::new(),
        _ => return,
    };
    values.insert(name.to_string(), JsonValue::String(rendered));
}

/// Pops `name` and inserts its object entries under derived keys; anything
/// else collapses to an empty value.
fn expand_object(values: &mut JsonObject, name: &str, key_for: impl Fn(&str) -> String) {
    match values.shift_remove(name) {
        Some(JsonValue::Object(object)) if !object.is_empty() => {
            for (key, value) in object {
                values.insert(key_for(&key), value);
            }
        }
        _ => {
            values.insert(name.to_string(), JsonValue::String(String::new()));
        }
    }
}

/// Items of a collection value; a scalar is a one-element collection and
/// `null` an empty one.
fn items(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::Array(items) => items.iter().map(wire_string).collect(),
        JsonValue::Null => Vec::new(),
        other => vec![wire_string(other)],
    }
}

fn join_items(value: &JsonValue, delimiter: &str) -> String {
    items(value).join(delimiter)
}

fn pairs(object: &JsonObject, separator: &str, delimiter: &str) -> String {
    object
        .iter()
        .map(|(key, value)| format!("{key}{separator}{}", wire_string(value)))
        .collect::<Vec<_>>()
        .join(delimiter)
}

fn flattened(object: &JsonObject) -> String {
    object
        .iter()
        .flat_map(|(key, value)| [key.clone(), wire_string(value)])
        .collect::<Vec<_>>()
        .join(",")
}

fn prefixed(prefix: char, joined: String) -> String {
    if joined.is_empty() {
        joined
    } else {
        format!("{prefix}{joined}")
    }
}

fn label(value: &JsonValue, shape: ValueShape, explode: bool) -> String {
    match (shape, value) {
        (ValueShape::Object, JsonValue::Object(object)) => {
            let joined = if explode {
                pairs(object, "=", ".")
            } else {
                flattened(object)
            };
            prefixed('.', joined)
        }
        (ValueShape::Array, _) => {
            let delimiter = if explode { "." } else { "," };
            prefixed('.', join_items(value, delimiter))
        }
        _ => prefixed('.', wire_string(value)),
    }
}

fn matrix(name: &str, value: &JsonValue, shape: ValueShape, explode: bool) -> String {
    match (shape, value) {
        (ValueShape::Object, JsonValue::Object(object)) => {
            if explode {
                prefixed(';', pairs(object, "=", ";"))
            } else {
                let joined = flattened(object);
                if joined.is_empty() {
                    joined
                } else {
                    format!(";{name}={joined}")
                }
            }
        }
        (ValueShape::Array, _) => {
            let items = items(value);
            if items.is_empty() {
                String::new()
            } else if explode {
                items
                    .iter()
                    .map(|item| format!(";{name}={item}"))
                    .collect::<String>()
            } else {
                format!(";{name}={}", items.join(","))
            }
        }
        (_, JsonValue::Null) => String::new(),
        _ => format!(";{name}={}", wire_string(value)),
    }
}
