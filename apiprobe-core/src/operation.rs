//! Resolved operation model consumed by the generators.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::schema::SchemaArena;
use crate::stateful::{ApiTransitions, LinkDefinition};
use crate::JsonObject;

/// Flavour of the source API description.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum SpecDialect {
    #[default]
    #[serde(rename = "openapi3")]
    OpenApi3,
    #[serde(rename = "swagger2")]
    Swagger2,
}

impl SpecDialect {
    /// Keyword marking a schema as nullable in this dialect.
    pub fn nullable_keyword(self) -> &'static str {
        match self {
            SpecDialect::OpenApi3 => "nullable",
            SpecDialect::Swagger2 => "x-nullable",
        }
    }
}

/// Where a parameter travels. Declaration order is the generation visiting order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Header,
    Cookie,
    Path,
}

impl ParameterLocation {
    pub const ALL: [ParameterLocation; 4] = [
        ParameterLocation::Query,
        ParameterLocation::Header,
        ParameterLocation::Cookie,
        ParameterLocation::Path,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
            ParameterLocation::Path => "path",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OpenAPI 3 serialization style.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterStyle {
    Simple,
    Label,
    Matrix,
    Form,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

/// Swagger 2 `collectionFormat`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionFormat {
    Csv,
    Ssv,
    Tsv,
    Pipes,
    Multi,
}

impl CollectionFormat {
    /// Join delimiter; `multi` repeats the key instead.
    pub fn delimiter(self) -> Option<&'static str> {
        match self {
            CollectionFormat::Csv => Some(","),
            CollectionFormat::Ssv => Some(" "),
            CollectionFormat::Tsv => Some("\t"),
            CollectionFormat::Pipes => Some("|"),
            CollectionFormat::Multi => None,
        }
    }
}

fn default_schema() -> JsonValue {
    JsonValue::Object(JsonObject::new())
}

/// A single declared parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_schema")]
    pub schema: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ParameterStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explode: Option<bool>,
    #[serde(
        default,
        rename = "collectionFormat",
        skip_serializing_if = "Option::is_none"
    )]
    pub collection_format: Option<CollectionFormat>,
    /// Media type of a content-based parameter.
    #[serde(default, rename = "mediaType", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<JsonValue>,
    #[serde(default, rename = "x-example", skip_serializing_if = "Option::is_none")]
    pub x_example: Option<JsonValue>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, location: ParameterLocation, schema: JsonValue) -> Self {
        Self {
            name: name.into(),
            location,
            required: false,
            schema,
            style: None,
            explode: None,
            collection_format: None,
            media_type: None,
            example: None,
            examples: None,
            x_example: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_style(mut self, style: ParameterStyle, explode: Option<bool>) -> Self {
        self.style = Some(style);
        self.explode = explode;
        self
    }

    /// Examples declared on the parameter itself, in declaration order.
    pub fn declared_examples(&self) -> Vec<JsonValue> {
        collect_examples(
            self.example.as_ref(),
            self.examples.as_ref(),
            self.x_example.as_ref(),
        )
    }
}

/// One media type of a request body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaTypeDefinition {
    pub media_type: String,
    #[serde(default = "default_schema")]
    pub schema: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<JsonValue>,
}

impl MediaTypeDefinition {
    pub fn declared_examples(&self) -> Vec<JsonValue> {
        collect_examples(self.example.as_ref(), self.examples.as_ref(), None)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    pub required: bool,
    /// Alternatives in declaration order; the first one is the default.
    pub content: Vec<MediaTypeDefinition>,
}

/// One method + path combination with its parameters and body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub dialect: SpecDialect,
    /// Every method declared on the same path, including this one.
    #[serde(default)]
    pub path_methods: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
}

impl Operation {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            dialect: SpecDialect::default(),
            path_methods: Vec::new(),
            parameters: Vec::new(),
            request_body: None,
        }
    }

    /// `METHOD /path`, the key used by links and case ids.
    pub fn label(&self) -> String {
        format!("{} {}", self.method.to_uppercase(), self.path)
    }

    pub fn parameters_in(
        &self,
        location: ParameterLocation,
    ) -> impl Iterator<Item = &Parameter> + '_ {
        self.parameters
            .iter()
            .filter(move |parameter| parameter.location == location)
    }

    pub fn has_parameters_in(&self, location: ParameterLocation) -> bool {
        self.parameters_in(location).next().is_some()
    }

    /// Upper-cased methods declared on the path, always including this operation's own.
    pub fn declared_methods(&self) -> BTreeSet<String> {
        let mut methods: BTreeSet<String> = self
            .path_methods
            .iter()
            .map(|method| method.to_uppercase())
            .collect();
        methods.insert(self.method.to_uppercase());
        methods
    }

    fn validate(&self) -> Result<(), DocumentError> {
        let invalid = |reason: String| DocumentError::InvalidOperation {
            label: self.label(),
            reason,
        };
        if self.method.trim().is_empty() {
            return Err(invalid("method must not be empty".to_string()));
        }
        if !self.path.starts_with('/') {
            return Err(invalid(format!("path '{}' must start with '/'", self.path)));
        }
        let mut seen = HashSet::new();
        for parameter in &self.parameters {
            if !seen.insert((parameter.location, parameter.name.as_str())) {
                return Err(invalid(format!(
                    "duplicate parameter '{}' in {}",
                    parameter.name, parameter.location
                )));
            }
            if parameter.location == ParameterLocation::Path
                && !self.path.contains(&format!("{{{}}}", parameter.name))
            {
                return Err(invalid(format!(
                    "path parameter '{}' does not appear in the path template",
                    parameter.name
                )));
            }
        }
        if let Some(body) = &self.request_body {
            if body.content.is_empty() {
                return Err(invalid("request body must declare a media type".to_string()));
            }
        }
        Ok(())
    }
}

/// A resolved API description: operations, shared definitions and links.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiDocument {
    #[serde(default)]
    pub definitions: JsonObject,
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub links: Vec<LinkDefinition>,
}

impl ApiDocument {
    pub fn from_json_str(contents: &str) -> Result<Self, DocumentError> {
        let document: ApiDocument =
            serde_json::from_str(contents).map_err(|error| DocumentError::Parse(error.to_string()))?;
        document.validate()?;
        Ok(document)
    }

    pub fn validate(&self) -> Result<(), DocumentError> {
        let mut labels = HashSet::new();
        for operation in &self.operations {
            operation.validate()?;
            if !labels.insert(operation.label()) {
                return Err(DocumentError::InvalidOperation {
                    label: operation.label(),
                    reason: "operation declared twice".to_string(),
                });
            }
        }
        for link in &self.links {
            for label in [&link.source, &link.target] {
                if !labels.contains(label) {
                    return Err(DocumentError::UnknownLinkOperation {
                        link: link.name.clone(),
                        label: label.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn operation(&self, label: &str) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|operation| operation.label() == label)
    }

    pub fn arena(&self) -> SchemaArena {
        SchemaArena::new(&self.definitions)
    }

    pub fn transitions(&self) -> ApiTransitions {
        ApiTransitions::from_links(self.links.iter().cloned())
    }
}

/// Errors raised while loading a resolved API document.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DocumentError {
    /// The document is not valid JSON or does not match the expected shape.
    Parse(String),
    /// An operation is structurally inconsistent.
    InvalidOperation { label: String, reason: String },
    /// A link names an operation that is not part of the document.
    UnknownLinkOperation { link: String, label: String },
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentError::Parse(error) => write!(f, "invalid API document: {error}"),
            DocumentError::InvalidOperation { label, reason } => {
                write!(f, "invalid operation '{label}': {reason}")
            }
            DocumentError::UnknownLinkOperation { link, label } => {
                write!(f, "link '{link}' references unknown operation '{label}'")
            }
        }
    }
}

impl std::error::Error for DocumentError {}

fn collect_examples(
    example: Option<&JsonValue>,
    examples: Option<&JsonValue>,
    x_example: Option<&JsonValue>,
) -> Vec<JsonValue> {
    let mut collected = Vec::new();
    if let Some(example) = example {
        collected.push(example.clone());
    }
    match examples {
        // OpenAPI 3 `examples` map: name -> {value}.
        Some(JsonValue::Object(named)) => {
            for entry in named.values() {
                if let Some(value) = entry.get("value") {
                    collected.push(value.clone());
                }
            }
        }
        Some(JsonValue::Array(values)) => collected.extend(values.iter().cloned()),
        _ => {}
    }
    if let Some(example) = x_example {
        collected.push(example.clone());
    }
    collected
}
