//! Deterministic boundary and negative case enumeration ("coverage" phase).

use std::collections::{BTreeMap, HashSet};

use log::{debug, warn};
use serde_json::Value as JsonValue;

use crate::config::GenerationConfig;
use crate::normalize::{normalize, NormalizeOptions};
use crate::operation::{Operation, Parameter, ParameterLocation};
use crate::schema::{inferred_type, SchemaArena};
use crate::serialize::stringify_leaves;
use crate::{
    Case, CaseId, CaseMeta, ComponentInfo, ComponentKind, GenerationMode, JsonObject, PhaseData,
    PhaseName,
};

mod methods;
mod mutations;
mod patterns;
mod values;

pub use methods::{unexpected_methods, DEFAULT_UNEXPECTED_METHODS};
pub use mutations::{Mutation, MutationKind, MutationTable};

use mutations::MutationContext;
use values::{accepted, positive_values, DEFAULT_POSITIVE};

/// A generated value with its stable description.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Candidate {
    pub(crate) value: JsonValue,
    pub(crate) description: String,
}

impl Candidate {
    pub(crate) fn new(value: JsonValue, description: impl Into<String>) -> Self {
        Self {
            value,
            description: description.into(),
        }
    }
}

/// One parameter, resolved and normalized.
struct ParameterComponent<'o> {
    parameter: &'o Parameter,
    /// `None` when the schema could not be resolved.
    schema: Option<JsonValue>,
    /// Wire-ready positive values; the first is the base.
    positives: Vec<Candidate>,
}

impl ParameterComponent<'_> {
    fn location(&self) -> ParameterLocation {
        self.parameter.location
    }

    fn name(&self) -> &str {
        &self.parameter.name
    }

    fn base(&self) -> Option<&JsonValue> {
        self.positives.first().map(|candidate| &candidate.value)
    }
}

struct MediaComponent {
    media_type: String,
    schema: Option<JsonValue>,
    positives: Vec<Candidate>,
}

struct BodyComponent {
    required: bool,
    alternatives: Vec<MediaComponent>,
}

impl BodyComponent {
    fn base(&self) -> Option<(String, JsonValue)> {
        let first = self.alternatives.first()?;
        let base = first.positives.first()?;
        Some((first.media_type.clone(), base.value.clone()))
    }
}

/// The component a case deviates from the base in.
enum Change {
    None,
    /// Replace (`Some`) or drop (`None`) one parameter.
    Parameter {
        location: ParameterLocation,
        name: String,
        value: Option<JsonValue>,
    },
    /// Replace a whole location map.
    Location {
        location: ParameterLocation,
        values: JsonObject,
    },
    /// Replace (`Some`) or drop (`None`) the body.
    Body(Option<(String, JsonValue)>),
}

impl Change {
    fn kind(&self) -> Option<ComponentKind> {
        match self {
            Change::None => None,
            Change::Parameter { location, .. } | Change::Location { location, .. } => {
                Some(ComponentKind::from(*location))
            }
            Change::Body(_) => Some(ComponentKind::Body),
        }
    }
}

/// Resolved components of one operation.
struct Components<'o> {
    operation: &'o Operation,
    parameters: Vec<ParameterComponent<'o>>,
    body: Option<BodyComponent>,
}

impl Components<'_> {
    fn kinds(&self) -> Vec<ComponentKind> {
        let mut kinds: Vec<ComponentKind> = ParameterLocation::ALL
            .into_iter()
            .filter(|location| self.operation.has_parameters_in(*location))
            .map(ComponentKind::from)
            .collect();
        if self.body.is_some() {
            kinds.push(ComponentKind::Body);
        }
        kinds
    }

    /// Base map of one location; `None` when a required parameter has no base.
    fn location_base(&self, location: ParameterLocation) -> Option<JsonObject> {
        self.location_with(location, None)
    }

    /// Location map in declaration order with `replaced` swapped in for its
    /// base value; a `None` replacement drops the parameter.
    fn location_with(
        &self,
        location: ParameterLocation,
        replaced: Option<(&str, Option<&JsonValue>)>,
    ) -> Option<JsonObject> {
        let mut values = JsonObject::new();
        for component in self.parameters.iter().filter(|c| c.location() == location) {
            let value = match replaced {
                Some((name, replacement)) if name == component.name() => replacement,
                _ => match component.base() {
                    Some(value) => Some(value),
                    None if component.parameter.required => return None,
                    None => None,
                },
            };
            if let Some(value) = value {
                values.insert(component.name().to_string(), value.clone());
            }
        }
        Some(values)
    }

    /// Builds a case that differs from the base only in `change`.
    ///
    /// Returns `None` when another required component has no base value.
    fn assemble(
        &self,
        method: &str,
        change: Change,
        mode: GenerationMode,
        data: PhaseData,
    ) -> Option<Case> {
        let changed_kind = change.kind();
        let mut case = blank_case(self.operation, method);
        for location in ParameterLocation::ALL {
            let values = match &change {
                Change::Location {
                    location: changed,
                    values,
                } if *changed == location => values.clone(),
                Change::Parameter {
                    location: changed,
                    name,
                    value,
                } if *changed == location => {
                    self.location_with(location, Some((name.as_str(), value.as_ref())))?
                }
                _ => self.location_base(location)?,
            };
            if !values.is_empty() {
                *case.location_mut(location) = Some(values);
            }
        }
        let body = match change {
            Change::Body(body) => body,
            _ => match &self.body {
                Some(body) => match body.base() {
                    Some(base) => Some(base),
                    None if body.required => return None,
                    None => None,
                },
                None => None,
            },
        };
        if let Some((media_type, value)) = body {
            case.media_type = Some(media_type);
            case.body = Some(value);
        }
        let components = self
            .kinds()
            .into_iter()
            .map(|kind| {
                let mode = if Some(kind) == changed_kind {
                    mode
                } else {
                    GenerationMode::Positive
                };
                (kind, ComponentInfo { mode })
            })
            .collect();
        case.meta = CaseMeta::new(PhaseName::Coverage, data, components);
        Some(case)
    }
}

/// Enumerates the coverage-phase cases of an operation.
pub struct CoverageGenerator<'a> {
    config: &'a GenerationConfig,
    table: &'a MutationTable,
    arena: &'a SchemaArena,
}

impl<'a> CoverageGenerator<'a> {
    pub fn new(config: &'a GenerationConfig, table: &'a MutationTable, arena: &'a SchemaArena) -> Self {
        Self {
            config,
            table,
            arena,
        }
    }

    /// Ordered, deduplicated cases for `operation` in the requested modes.
    pub fn generate(&self, operation: &Operation, modes: &[GenerationMode]) -> Vec<Case> {
        let components = self.components(operation);
        let positive = modes.iter().any(|mode| mode.is_positive());
        let negative = modes.iter().any(|mode| mode.is_negative());
        let mut cases = Vec::new();
        if negative {
            self.emit_negative(&components, &mut cases);
        } else if positive {
            self.emit_positive_variants(&components, &mut cases);
        }
        if positive {
            cases.extend(components.assemble(
                &operation.method.to_uppercase(),
                Change::None,
                GenerationMode::Positive,
                PhaseData::described(DEFAULT_POSITIVE),
            ));
        }
        let label = operation.label();
        let mut seen = HashSet::new();
        cases.retain(|case| seen.insert(case.request_key()));
        for (index, case) in cases.iter_mut().enumerate() {
            case.id = CaseId::generated(&label, PhaseName::Coverage, index);
        }
        debug!("{label}: {} coverage cases", cases.len());
        cases
    }

    fn resolve(&self, schema: &JsonValue, options: &NormalizeOptions, what: &str) -> Option<JsonValue> {
        match self.arena.expand(schema, self.config.max_reference_depth) {
            Ok(expanded) => Some(normalize(&expanded, options)),
            Err(error) => {
                warn!("{what}: {error}; no cases for this component");
                None
            }
        }
    }

    fn components<'o>(&self, operation: &'o Operation) -> Components<'o> {
        let label = operation.label();
        let mut parameters = Vec::new();
        for location in ParameterLocation::ALL {
            for parameter in operation.parameters_in(location) {
                let options =
                    NormalizeOptions::request(operation.dialect).for_location(Some(location));
                let what = format!("{label} {location} parameter '{}'", parameter.name);
                let schema = self.resolve(&parameter.schema, &options, &what);
                let positives = match &schema {
                    Some(schema) => {
                        let mut candidates: Vec<Candidate> = parameter
                            .declared_examples()
                            .into_iter()
                            .map(|example| Candidate::new(example, "Example value"))
                            .collect();
                        candidates.extend(positive_values(schema));
                        stringified(accepted(schema, candidates))
                    }
                    None => Vec::new(),
                };
                parameters.push(ParameterComponent {
                    parameter,
                    schema,
                    positives,
                });
            }
        }
        let body = operation.request_body.as_ref().map(|body| {
            let alternatives = body
                .content
                .iter()
                .map(|media| {
                    let options = NormalizeOptions::request(operation.dialect);
                    let what = format!("{label} body '{}'", media.media_type);
                    let schema = self.resolve(&media.schema, &options, &what);
                    let positives = match &schema {
                        Some(schema) => {
                            let mut candidates: Vec<Candidate> = media
                                .declared_examples()
                                .into_iter()
                                .map(|example| Candidate::new(example, "Example value"))
                                .collect();
                            candidates.extend(positive_values(schema));
                            accepted(schema, candidates)
                        }
                        None => Vec::new(),
                    };
                    MediaComponent {
                        media_type: media.media_type.clone(),
                        schema,
                        positives,
                    }
                })
                .collect();
            BodyComponent {
                required: body.required,
                alternatives,
            }
        });
        Components {
            operation,
            parameters,
            body,
        }
    }

    fn emit_positive_variants(&self, components: &Components<'_>, cases: &mut Vec<Case>) {
        let method = components.operation.method.to_uppercase();
        for component in &components.parameters {
            for variant in component.positives.iter().skip(1) {
                let data = PhaseData::described(variant.description.clone())
                    .with_parameter(component.name(), component.location());
                let change = Change::Parameter {
                    location: component.location(),
                    name: component.name().to_string(),
                    value: Some(variant.value.clone()),
                };
                cases.extend(components.assemble(&method, change, GenerationMode::Positive, data));
            }
        }
        if let Some(body) = &components.body {
            for (index, media) in body.alternatives.iter().enumerate() {
                let variants: Vec<&Candidate> = if index == 0 {
                    media.positives.iter().skip(1).collect()
                } else {
                    media.positives.iter().take(1).collect()
                };
                for variant in variants {
                    let description = if index == 0 {
                        variant.description.clone()
                    } else {
                        "Alternative media type".to_string()
                    };
                    let change = Change::Body(Some((media.media_type.clone(), variant.value.clone())));
                    cases.extend(components.assemble(
                        &method,
                        change,
                        GenerationMode::Positive,
                        PhaseData::described(description),
                    ));
                }
            }
        }
        for location in ParameterLocation::ALL {
            let Some(mut values) = components.location_base(location) else {
                continue;
            };
            let optional: Vec<&ParameterComponent<'_>> = components
                .parameters
                .iter()
                .filter(|c| c.location() == location && !c.parameter.required)
                .filter(|c| values.contains_key(c.name()))
                .collect();
            for component in optional.into_iter().rev() {
                values.shift_remove(component.name());
                let description = format!(
                    "Missing optional parameter `{}` at {location}",
                    component.name()
                );
                let data = PhaseData::described(description)
                    .with_parameter(component.name(), location);
                let change = Change::Location {
                    location,
                    values: values.clone(),
                };
                cases.extend(components.assemble(&method, change, GenerationMode::Positive, data));
            }
        }
    }

    fn emit_negative(&self, components: &Components<'_>, cases: &mut Vec<Case>) {
        let method = components.operation.method.to_uppercase();
        for component in &components.parameters {
            let location = component.location();
            let name = component.name().to_string();
            let described = |description: String| {
                PhaseData::described(description).with_parameter(name.clone(), location)
            };
            let replace = |value: Option<JsonValue>| Change::Parameter {
                location,
                name: name.clone(),
                value,
            };
            if let Some(schema) = &component.schema {
                let context = MutationContext {
                    table: self.table,
                    location: Some(location),
                };
                for candidate in context.negatives(schema) {
                    let value = stringify_leaves(&candidate.value);
                    cases.extend(components.assemble(
                        &method,
                        replace(Some(value)),
                        GenerationMode::Negative,
                        described(candidate.description),
                    ));
                }
            }
            if component.parameter.required {
                cases.extend(components.assemble(
                    &method,
                    replace(None),
                    GenerationMode::Negative,
                    described(format!("Missing `{name}` at {location}")),
                ));
            }
            if self.duplicates_allowed(location) && is_scalar(component) {
                if let Some(base) = component.base() {
                    let duplicated = JsonValue::Array(vec![base.clone(), base.clone()]);
                    cases.extend(components.assemble(
                        &method,
                        replace(Some(duplicated)),
                        GenerationMode::Negative,
                        described(format!("Duplicate `{name}` at {location}")),
                    ));
                }
            }
        }
        if let Some(body) = &components.body {
            let context = MutationContext {
                table: self.table,
                location: None,
            };
            for media in &body.alternatives {
                let Some(schema) = &media.schema else {
                    continue;
                };
                for candidate in context.negatives(schema) {
                    // A `null` body cannot be told apart from a missing one.
                    if candidate.value.is_null() {
                        continue;
                    }
                    let change = Change::Body(Some((media.media_type.clone(), candidate.value)));
                    cases.extend(components.assemble(
                        &method,
                        change,
                        GenerationMode::Negative,
                        PhaseData::described(candidate.description),
                    ));
                }
            }
            if body.required {
                cases.extend(components.assemble(
                    &method,
                    Change::Body(None),
                    GenerationMode::Negative,
                    PhaseData::described("Missing request body"),
                ));
            }
        }
        for unexpected in unexpected_methods(components.operation, &self.config.unexpected_methods) {
            cases.push(unexpected_method_case(components, &unexpected));
        }
    }

    fn duplicates_allowed(&self, location: ParameterLocation) -> bool {
        match location {
            ParameterLocation::Query => self.config.duplicate_query_parameters,
            ParameterLocation::Header => self.config.duplicate_header_parameters,
            ParameterLocation::Cookie | ParameterLocation::Path => false,
        }
    }
}

/// Declares a primitive type; unconstrained parameters are never duplicated.
fn is_scalar(component: &ParameterComponent<'_>) -> bool {
    let declared = component
        .schema
        .as_ref()
        .and_then(JsonValue::as_object)
        .and_then(inferred_type);
    matches!(declared, Some(name) if name != "array" && name != "object")
}

fn stringified(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|candidate| Candidate::new(stringify_leaves(&candidate.value), candidate.description))
        .filter(|candidate| seen.insert(candidate.value.to_string()))
        .collect()
}

/// Base values sent with a method the path does not declare.
fn unexpected_method_case(components: &Components<'_>, method: &str) -> Case {
    let description = format!("Unspecified HTTP method: {method}");
    let mut case = components
        .assemble(method, Change::None, GenerationMode::Positive, PhaseData::default())
        .unwrap_or_else(|| blank_case(components.operation, method));
    case.meta = CaseMeta::unexpected_method(PhaseName::Coverage, description);
    case
}

fn blank_case(operation: &Operation, method: &str) -> Case {
    Case {
        id: CaseId::new(""),
        operation: operation.label(),
        method: method.to_string(),
        path: operation.path.clone(),
        path_parameters: None,
        query: None,
        headers: None,
        cookies: None,
        body: None,
        media_type: None,
        meta: CaseMeta::new(PhaseName::Coverage, PhaseData::default(), BTreeMap::new()),
    }
}

#[cfg(test)]
#[path = "../../tests/internal/coverage_unit_tests.rs"]
mod tests;
