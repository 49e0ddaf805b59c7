//! Seeded random case generation ("fuzzing" phase).

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, warn};
use proptest::prelude::*;
use proptest::strategy::ValueTree;
use proptest::test_runner::{Config as ProptestConfig, RngAlgorithm, TestRng, TestRunner};
use serde_json::Value as JsonValue;

use crate::config::ProbeConfig;
use crate::normalize::{normalize, NormalizeOptions};
use crate::operation::{Operation, ParameterLocation};
use crate::schema::SchemaArena;
use crate::serialize::stringify_leaves;
use crate::{
    Case, CaseId, CaseMeta, ComponentInfo, ComponentKind, GenerationMode, JsonObject, PhaseData,
    PhaseName,
};

mod strategy;

pub use strategy::{value_strategy, PatternIndex};

/// Errors raised while preparing random generation for an operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GenerationError {
    /// A required component cannot be generated.
    UnsupportedSchema { component: String, reason: String },
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::UnsupportedSchema { component, reason } => {
                write!(f, "unsupported schema for {component}: {reason}")
            }
        }
    }
}

impl std::error::Error for GenerationError {}

struct ParameterStrategy {
    location: ParameterLocation,
    name: String,
    /// `None` when an optional parameter is left out.
    value: BoxedStrategy<Option<JsonValue>>,
}

/// Endless stream of random positive cases for one operation.
pub struct RandomCases {
    label: String,
    method: String,
    path: String,
    kinds: Vec<ComponentKind>,
    parameters: Vec<ParameterStrategy>,
    /// Media type and body; `None` when an optional body is left out.
    body: Option<BoxedStrategy<Option<(String, JsonValue)>>>,
    runner: TestRunner,
    generated: usize,
}

impl fmt::Debug for RandomCases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomCases")
            .field("label", &self.label)
            .field("generated", &self.generated)
            .finish()
    }
}

impl RandomCases {
    pub fn new(
        operation: &Operation,
        arena: &SchemaArena,
        config: &ProbeConfig,
    ) -> Result<Self, GenerationError> {
        let label = operation.label();
        let depth = config.generation.max_reference_depth;
        let mut kinds = Vec::new();
        let mut parameters = Vec::new();
        for location in ParameterLocation::ALL {
            let mut present = false;
            for parameter in operation.parameters_in(location) {
                let component = format!("{location} parameter '{}'", parameter.name);
                let options = NormalizeOptions::request(operation.dialect)
                    .with_fold_lengths(true)
                    .for_location(Some(location));
                let compiled = arena
                    .expand(&parameter.schema, depth)
                    .map_err(|error| error.to_string())
                    .and_then(|schema| {
                        let schema = normalize(&schema, &options);
                        let patterns = PatternIndex::from_schemas([&schema]);
                        value_strategy(&schema, &patterns)
                    });
                let strategy = match compiled {
                    Ok(strategy) => strategy.prop_map(|value| stringify_leaves(&value)),
                    Err(reason) if parameter.required => {
                        return Err(GenerationError::UnsupportedSchema { component, reason })
                    }
                    Err(reason) => {
                        warn!("{label}: skipping {component}: {reason}");
                        continue;
                    }
                };
                let value = if parameter.required {
                    strategy.prop_map(Some).boxed()
                } else {
                    prop_oneof![Just(None), strategy.prop_map(Some)].boxed()
                };
                parameters.push(ParameterStrategy {
                    location,
                    name: parameter.name.clone(),
                    value,
                });
                present = true;
            }
            if present {
                kinds.push(ComponentKind::from(location));
            }
        }
        let body = match &operation.request_body {
            Some(body) => {
                let options = NormalizeOptions::request(operation.dialect).with_fold_lengths(true);
                let mut alternatives = Vec::new();
                let mut failures = Vec::new();
                for media in &body.content {
                    let compiled = arena
                        .expand(&media.schema, depth)
                        .map_err(|error| error.to_string())
                        .and_then(|schema| {
                            let schema = normalize(&schema, &options);
                            let patterns = PatternIndex::from_schemas([&schema]);
                            value_strategy(&schema, &patterns)
                        });
                    match compiled {
                        Ok(strategy) => {
                            let media_type = media.media_type.clone();
                            alternatives.push(
                                strategy
                                    .prop_map(move |value| Some((media_type.clone(), value)))
                                    .boxed(),
                            );
                        }
                        Err(reason) => failures.push(format!("{}: {reason}", media.media_type)),
                    }
                }
                if alternatives.is_empty() {
                    let reason = failures.join("; ");
                    if body.required {
                        return Err(GenerationError::UnsupportedSchema {
                            component: "request body".to_string(),
                            reason,
                        });
                    }
                    warn!("{label}: skipping request body: {reason}");
                    None
                } else {
                    kinds.push(ComponentKind::Body);
                    let union = proptest::strategy::Union::new(alternatives).boxed();
                    Some(if body.required {
                        union
                    } else {
                        prop_oneof![Just(None), union].boxed()
                    })
                }
            }
            None => None,
        };
        debug!(
            "{label}: random generation ready with seed {}",
            config.fuzzing.seed
        );
        Ok(Self {
            label,
            method: operation.method.to_uppercase(),
            path: operation.path.clone(),
            kinds,
            parameters,
            body,
            runner: seeded_test_runner(config.fuzzing.seed),
            generated: 0,
        })
    }

    fn sample<T: fmt::Debug>(
        runner: &mut TestRunner,
        strategy: &BoxedStrategy<T>,
    ) -> Result<T, String> {
        strategy
            .new_tree(runner)
            .map(|tree| tree.current())
            .map_err(|reason| reason.message().to_string())
    }

    fn next_case(&mut self) -> Result<Case, String> {
        let mut case = Case {
            id: CaseId::generated(&self.label, PhaseName::Fuzzing, self.generated),
            operation: self.label.clone(),
            method: self.method.clone(),
            path: self.path.clone(),
            path_parameters: None,
            query: None,
            headers: None,
            cookies: None,
            body: None,
            media_type: None,
            meta: CaseMeta::new(PhaseName::Fuzzing, PhaseData::default(), BTreeMap::new()),
        };
        for parameter in &self.parameters {
            if let Some(value) = Self::sample(&mut self.runner, &parameter.value)? {
                case.location_mut(parameter.location)
                    .get_or_insert_with(JsonObject::new)
                    .insert(parameter.name.clone(), value);
            }
        }
        if let Some(body) = &self.body {
            if let Some((media_type, value)) = Self::sample(&mut self.runner, body)? {
                case.media_type = Some(media_type);
                case.body = Some(value);
            }
        }
        let components = self
            .kinds
            .iter()
            .map(|kind| {
                let info = ComponentInfo {
                    mode: GenerationMode::Positive,
                };
                (*kind, info)
            })
            .collect();
        case.meta = CaseMeta::new(PhaseName::Fuzzing, PhaseData::default(), components);
        Ok(case)
    }
}

impl Iterator for RandomCases {
    type Item = Case;

    /// Ends only when a strategy gives up on producing a value.
    fn next(&mut self) -> Option<Case> {
        match self.next_case() {
            Ok(case) => {
                self.generated += 1;
                Some(case)
            }
            Err(reason) => {
                warn!("{}: random generation stopped: {reason}", self.label);
                None
            }
        }
    }
}

pub(crate) fn seeded_test_runner(seed: u64) -> TestRunner {
    let config = ProptestConfig {
        rng_algorithm: RngAlgorithm::ChaCha,
        ..ProptestConfig::default()
    };
    let seed_bytes = seed_bytes(seed, 32);
    let rng = TestRng::from_seed(config.rng_algorithm, &seed_bytes);
    TestRunner::new_with_rng(config, rng)
}

fn seed_bytes(seed: u64, len: usize) -> Vec<u8> {
    let bytes = seed.to_le_bytes();
    let mut output = Vec::with_capacity(len);
    while output.len() < len {
        output.extend_from_slice(&bytes);
    }
    output.truncate(len);
    output
}

#[cfg(test)]
#[path = "../../tests/internal/random_unit_tests.rs"]
mod tests;
