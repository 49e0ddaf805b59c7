//! Public API types for generating and sequencing API test requests.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub mod config;
pub mod coverage;
pub mod normalize;
pub mod operation;
pub mod random;
pub mod schema;
pub mod serialize;
pub mod stateful;

pub use config::{
    default_apiprobe_toml, load_config, load_config_from, parse_config, ConfigSource,
    FuzzingConfig, GenerationConfig, ProbeConfig, StatefulConfig,
};
pub use coverage::{
    unexpected_methods, CoverageGenerator, Mutation, MutationKind, MutationTable,
    DEFAULT_UNEXPECTED_METHODS,
};
pub use normalize::{normalize, NormalizeOptions, Target};
pub use operation::{
    ApiDocument, CollectionFormat, DocumentError, MediaTypeDefinition, Operation, Parameter,
    ParameterLocation, ParameterStyle, RequestBody, SpecDialect,
};
pub use random::{value_strategy, GenerationError, PatternIndex, RandomCases};
pub use schema::{ReferenceError, SchemaArena};
pub use serialize::{
    stringify_leaves, wire_string, LocationSerializer, OperationSerializer, Transform, ValueShape,
};
pub use stateful::{
    active_sources, ApiTransitions, CaseFactory, CaseNode, LinkDefinition,
    OperationTransitions, RandomCaseFactory, Response, ScenarioDriver, ScenarioRecorder,
    ScenarioStep, ScenarioTrace, StepInput, StopReason, Transition, TransitionController,
    Transport, TransportError, MAX_OPERATIONS_PER_SOURCE, MAX_ROOT_SOURCES,
};

/// JSON object map used for schemas and location values.
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Whether a value is meant to be accepted or rejected by the service.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Values conforming to the schema.
    Positive,
    /// Values violating at least one schema constraint.
    Negative,
}

impl GenerationMode {
    pub fn is_positive(self) -> bool {
        matches!(self, GenerationMode::Positive)
    }

    pub fn is_negative(self) -> bool {
        matches!(self, GenerationMode::Negative)
    }

    /// Combines component modes: negative as soon as one component is negative.
    pub fn aggregate<I>(modes: I) -> GenerationMode
    where
        I: IntoIterator<Item = GenerationMode>,
    {
        if modes.into_iter().any(GenerationMode::is_negative) {
            GenerationMode::Negative
        } else {
            GenerationMode::Positive
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationMode::Positive => write!(f, "positive"),
            GenerationMode::Negative => write!(f, "negative"),
        }
    }
}

/// Request container a component's value lands in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Query,
    Headers,
    Cookies,
    PathParameters,
    Body,
}

impl From<ParameterLocation> for ComponentKind {
    fn from(location: ParameterLocation) -> Self {
        match location {
            ParameterLocation::Query => ComponentKind::Query,
            ParameterLocation::Header => ComponentKind::Headers,
            ParameterLocation::Cookie => ComponentKind::Cookies,
            ParameterLocation::Path => ComponentKind::PathParameters,
        }
    }
}

/// Generation phase that produced a case.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseName {
    Coverage,
    Fuzzing,
    Stateful,
}

impl PhaseName {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseName::Coverage => "coverage",
            PhaseName::Fuzzing => "fuzzing",
            PhaseName::Stateful => "stateful",
        }
    }
}

/// Phase-specific details attached to a case.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PhaseData {
    /// Stable description of the value or violated constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Parameter the case targets, when it targets one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    /// Location of the targeted parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_location: Option<ParameterLocation>,
}

impl PhaseData {
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, location: ParameterLocation) -> Self {
        self.parameter = Some(name.into());
        self.parameter_location = Some(location);
        self
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub name: PhaseName,
    #[serde(default)]
    pub data: PhaseData,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GenerationInfo {
    pub mode: GenerationMode,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub mode: GenerationMode,
}

/// Generation metadata: overall mode, per-component modes and phase details.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CaseMeta {
    pub phase: Phase,
    pub generation: GenerationInfo,
    pub components: BTreeMap<ComponentKind, ComponentInfo>,
}

impl CaseMeta {
    /// Builds metadata whose overall mode is aggregated from the component modes.
    pub fn new(
        phase: PhaseName,
        data: PhaseData,
        components: BTreeMap<ComponentKind, ComponentInfo>,
    ) -> Self {
        let mode = GenerationMode::aggregate(components.values().map(|info| info.mode));
        Self {
            phase: Phase { name: phase, data },
            generation: GenerationInfo { mode },
            components,
        }
    }

    /// Metadata for a request whose method itself is the violation.
    ///
    /// Such cases carry no component modes and are negative overall.
    pub fn unexpected_method(phase: PhaseName, description: impl Into<String>) -> Self {
        Self {
            phase: Phase {
                name: phase,
                data: PhaseData::described(description),
            },
            generation: GenerationInfo {
                mode: GenerationMode::Negative,
            },
            components: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> GenerationMode {
        self.generation.mode
    }
}

/// Identifier of a generated case, unique within one run.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Builds the `{label}:{phase}:{index}` form used by the generators.
    pub fn generated(label: &str, phase: PhaseName, index: usize) -> Self {
        Self(format!("{label}:{}:{index}", phase.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One generated request, before or after wire serialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    /// Label of the operation the case was generated for, e.g. `GET /users`.
    pub operation: String,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_parameters: Option<JsonObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<JsonObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<JsonObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<JsonObject>,
    /// `Some(Value::Null)` is a JSON `null` body; `None` sends no body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub meta: CaseMeta,
}

impl Case {
    pub fn location(&self, location: ParameterLocation) -> Option<&JsonObject> {
        match location {
            ParameterLocation::Query => self.query.as_ref(),
            ParameterLocation::Header => self.headers.as_ref(),
            ParameterLocation::Cookie => self.cookies.as_ref(),
            ParameterLocation::Path => self.path_parameters.as_ref(),
        }
    }

    pub fn location_mut(&mut self, location: ParameterLocation) -> &mut Option<JsonObject> {
        match location {
            ParameterLocation::Query => &mut self.query,
            ParameterLocation::Header => &mut self.headers,
            ParameterLocation::Cookie => &mut self.cookies,
            ParameterLocation::Path => &mut self.path_parameters,
        }
    }

    /// Everything that reaches the wire; two cases with equal keys are duplicates.
    pub fn request_key(&self) -> String {
        let key = serde_json::json!([
            self.method,
            self.path_parameters,
            self.query,
            self.headers,
            self.cookies,
            self.body,
            self.media_type,
        ]);
        key.to_string()
    }

    /// Path with path parameters substituted, for display and `$url`.
    pub fn formatted_path(&self) -> String {
        let mut path = self.path.clone();
        if let Some(parameters) = &self.path_parameters {
            for (name, value) in parameters {
                let placeholder = format!("{{{name}}}");
                path = path.replace(&placeholder, &serialize::wire_string(value));
            }
        }
        path
    }
}
