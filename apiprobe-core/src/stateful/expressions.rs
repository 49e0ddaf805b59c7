//! Runtime expressions used by link parameters, e.g. `$response.body#/id`.

use serde_json::Value as JsonValue;

use super::Response;
use crate::operation::ParameterLocation;
use crate::schema::resolve_pointer;
use crate::serialize::wire_string;
use crate::Case;

/// The request/response pair an expression reads from.
#[derive(Clone, Copy, Debug)]
pub struct ExpressionContext<'a> {
    pub case: &'a Case,
    pub response: &'a Response,
}

impl<'a> ExpressionContext<'a> {
    pub fn new(case: &'a Case, response: &'a Response) -> Self {
        Self { case, response }
    }
}

/// Evaluates one link expression.
///
/// Strings without `$` are literals; `{$expr}` segments inside a string are
/// substituted and the result is always a string.
pub fn evaluate(expression: &str, context: &ExpressionContext<'_>) -> Option<JsonValue> {
    if expression.starts_with('$') {
        return evaluate_runtime(expression, context);
    }
    if expression.contains("{$") {
        return evaluate_template(expression, context).map(JsonValue::String);
    }
    Some(JsonValue::String(expression.to_string()))
}

/// Evaluates every string inside `template`; `None` if any of them fails.
pub fn evaluate_value(template: &JsonValue, context: &ExpressionContext<'_>) -> Option<JsonValue> {
    match template {
        JsonValue::String(expression) => evaluate(expression, context),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| evaluate_value(item, context))
            .collect::<Option<Vec<_>>>()
            .map(JsonValue::Array),
        JsonValue::Object(map) => map
            .iter()
            .map(|(key, value)| Some((key.clone(), evaluate_value(value, context)?)))
            .collect::<Option<serde_json::Map<_, _>>>()
            .map(JsonValue::Object),
        other => Some(other.clone()),
    }
}

fn evaluate_template(template: &str, context: &ExpressionContext<'_>) -> Option<String> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{$") {
        output.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let end = tail.find('}')?;
        let value = evaluate_runtime(&tail[..end], context)?;
        output.push_str(&wire_string(&value));
        rest = &tail[end + 1..];
    }
    output.push_str(rest);
    Some(output)
}

fn evaluate_runtime(expression: &str, context: &ExpressionContext<'_>) -> Option<JsonValue> {
    match expression {
        "$url" => return Some(JsonValue::String(context.case.formatted_path())),
        "$method" => return Some(JsonValue::String(context.case.method.to_uppercase())),
        "$statusCode" => return Some(JsonValue::from(context.response.status)),
        _ => {}
    }
    if let Some(source) = expression.strip_prefix("$request.") {
        return request_source(source, context.case);
    }
    if let Some(source) = expression.strip_prefix("$response.") {
        return response_source(source, context.response);
    }
    None
}

fn request_source(source: &str, case: &Case) -> Option<JsonValue> {
    if let Some(pointer) = body_pointer(source) {
        return resolve_pointer(case.body.as_ref()?, pointer).cloned();
    }
    let (location, name) = source.split_once('.')?;
    let location = match location {
        "path" => ParameterLocation::Path,
        "query" => ParameterLocation::Query,
        "header" => ParameterLocation::Header,
        "cookie" => ParameterLocation::Cookie,
        _ => return None,
    };
    let values = case.location(location)?;
    if location == ParameterLocation::Header {
        return values
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone());
    }
    values.get(name).cloned()
}

fn response_source(source: &str, response: &Response) -> Option<JsonValue> {
    if let Some(pointer) = body_pointer(source) {
        return resolve_pointer(response.body.as_ref()?, pointer).cloned();
    }
    let name = source.strip_prefix("header.")?;
    response
        .header(name)
        .map(|value| JsonValue::String(value.to_string()))
}

/// `body` -> `""`, `body#/a/b` -> `"/a/b"`.
fn body_pointer(source: &str) -> Option<&str> {
    let rest = source.strip_prefix("body")?;
    if rest.is_empty() {
        return Some("");
    }
    rest.strip_prefix('#')
}
