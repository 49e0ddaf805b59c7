use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use proptest::strategy::{Strategy, ValueTree};
use proptest::test_runner::TestRunner;
use serde::{Deserialize, Serialize};

use super::control::{active_sources, TransitionController};
use super::expressions::{evaluate, evaluate_value, ExpressionContext};
use super::recorder::ScenarioRecorder;
use super::transitions::{ApiTransitions, LinkDefinition};
use super::{Response, StepInput, Transition};
use crate::config::{ProbeConfig, StatefulConfig};
use crate::operation::{ApiDocument, Operation, ParameterLocation};
use crate::random::{seeded_test_runner, RandomCases};
use crate::schema::SchemaArena;
use crate::serialize::stringify_leaves;
use crate::{Case, CaseId, JsonObject, PhaseName};

/// Sends cases to the service under test.
pub trait Transport {
    fn send(&mut self, case: &Case) -> Result<Response, TransportError>;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error: {}", self.message)
    }
}

impl Error for TransportError {}

/// Produces the starting case of a step before link data is applied.
pub trait CaseFactory {
    fn case_for(&mut self, operation: &Operation) -> Option<Case>;
}

/// Draws step cases from per-operation random streams seeded by `stateful.seed`.
#[derive(Debug)]
pub struct RandomCaseFactory {
    arena: SchemaArena,
    config: ProbeConfig,
    streams: HashMap<String, Option<RandomCases>>,
}

impl RandomCaseFactory {
    pub fn new(arena: SchemaArena, config: &ProbeConfig) -> Self {
        let mut config = config.clone();
        config.fuzzing.seed = config.stateful.seed;
        Self {
            arena,
            config,
            streams: HashMap::new(),
        }
    }
}

impl CaseFactory for RandomCaseFactory {
    fn case_for(&mut self, operation: &Operation) -> Option<Case> {
        let label = operation.label();
        let stream = self.streams.entry(label).or_insert_with(|| {
            RandomCases::new(operation, &self.arena, &self.config)
                .map_err(|error| warn!("{error}"))
                .ok()
        });
        stream.as_mut()?.next()
    }
}

/// Why a scenario ended.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    MaxSteps,
    /// Every root and link move was gated off.
    NoMoves,
    Cancelled,
    Transport(String),
    Generation(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub case: Case,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
    /// `None` when sending failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioTrace {
    pub steps: Vec<ScenarioStep>,
    pub stop: StopReason,
}

enum Move<'l> {
    Root(&'l str),
    Link {
        link: &'l LinkDefinition,
        parent: CaseId,
    },
}

/// Runs one link-driven scenario against a transport.
pub struct ScenarioDriver<'a, T, F> {
    document: &'a ApiDocument,
    transitions: &'a ApiTransitions,
    transport: T,
    factory: F,
    max_steps: usize,
    runner: TestRunner,
    stop: Arc<AtomicBool>,
}

impl<'a, T, F> ScenarioDriver<'a, T, F>
where
    T: Transport,
    F: CaseFactory,
{
    pub fn new(
        document: &'a ApiDocument,
        transitions: &'a ApiTransitions,
        transport: T,
        factory: F,
        config: &StatefulConfig,
    ) -> Self {
        Self {
            document,
            transitions,
            transport,
            factory,
            max_steps: config.max_steps,
            runner: seeded_test_runner(config.seed),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares a flag that ends the scenario at the next step boundary.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn run(&mut self) -> ScenarioTrace {
        let transitions = self.transitions;
        let mut controller = TransitionController::new(transitions);
        let mut recorder = ScenarioRecorder::new();
        let mut bundles: BTreeMap<String, Vec<CaseId>> = BTreeMap::new();
        let mut steps = Vec::new();

        for step in 0..self.max_steps {
            if self.stop.load(Ordering::SeqCst) {
                info!("scenario cancelled after {step} steps");
                return ScenarioTrace {
                    steps,
                    stop: StopReason::Cancelled,
                };
            }

            let active = active_sources(&bundles);
            let mut moves = Vec::new();
            for (label, operation) in transitions.operations() {
                if !operation.outgoing.is_empty()
                    && controller.allow_root_transition(label, &active)
                {
                    moves.push(Move::Root(label.as_str()));
                }
            }
            for link in transitions.links() {
                if !controller.allow_transition(&link.source, &link.target) {
                    continue;
                }
                for parent in bundles.get(&link.bundle_name()).into_iter().flatten() {
                    moves.push(Move::Link {
                        link,
                        parent: parent.clone(),
                    });
                }
            }
            if moves.is_empty() {
                debug!("no allowed moves after {step} steps");
                return ScenarioTrace {
                    steps,
                    stop: StopReason::NoMoves,
                };
            }

            let index = match (0..moves.len()).new_tree(&mut self.runner) {
                Ok(tree) => tree.current(),
                Err(reason) => {
                    return ScenarioTrace {
                        steps,
                        stop: StopReason::Generation(reason.to_string()),
                    }
                }
            };
            let built = match &moves[index] {
                Move::Root(label) => self.build_case(label).map(|case| (case, None)),
                Move::Link { link, parent } => self.build_linked_case(link, parent, &recorder),
            };
            let (mut case, transition) = match built {
                Ok(built) => built,
                Err(reason) => {
                    warn!("{reason}");
                    return ScenarioTrace {
                        steps,
                        stop: StopReason::Generation(reason),
                    };
                }
            };
            case.id = CaseId::generated(&case.operation, PhaseName::Stateful, step);
            case.meta.phase.name = PhaseName::Stateful;
            debug!("step {step}: {}", case.id);

            recorder.record_case(case.clone(), transition.clone());
            let response = match self.transport.send(&case) {
                Ok(response) => response,
                Err(error) => {
                    warn!("{}: {error}", case.id);
                    steps.push(ScenarioStep {
                        case,
                        transition,
                        response: None,
                    });
                    return ScenarioTrace {
                        steps,
                        stop: StopReason::Transport(error.message),
                    };
                }
            };
            recorder.record_response(&case.id, response.clone());
            let input = StepInput {
                case,
                transition,
            };
            controller.record_step(&input, &recorder);

            for link in transitions.outgoing(&input.case.operation) {
                if link.matches_status(response.status) {
                    bundles
                        .entry(link.bundle_name())
                        .or_default()
                        .push(input.case.id.clone());
                }
            }
            steps.push(ScenarioStep {
                case: input.case,
                transition: input.transition,
                response: Some(response),
            });
        }
        ScenarioTrace {
            steps,
            stop: StopReason::MaxSteps,
        }
    }

    fn build_case(&mut self, label: &str) -> Result<Case, String> {
        let operation = self
            .document
            .operation(label)
            .ok_or_else(|| format!("unknown operation {label}"))?;
        self.factory
            .case_for(operation)
            .ok_or_else(|| format!("no case could be generated for {label}"))
    }

    fn build_linked_case(
        &mut self,
        link: &LinkDefinition,
        parent_id: &CaseId,
        recorder: &ScenarioRecorder,
    ) -> Result<(Case, Option<Transition>), String> {
        let mut case = self.build_case(&link.target)?;
        let mut transition = Transition {
            link: link.name.clone(),
            parent_id: parent_id.clone(),
            parameters: BTreeMap::new(),
        };
        let parent = recorder
            .get(parent_id)
            .ok_or_else(|| format!("parent case {parent_id} is not recorded"))?;
        let Some(response) = &parent.response else {
            return Ok((case, Some(transition)));
        };
        let context = ExpressionContext::new(&parent.case, response);
        let target = self.document.operation(&link.target);

        for (key, expression) in &link.parameters {
            let Some(value) = evaluate(expression, &context) else {
                debug!("{}: `{expression}` did not resolve", link.name);
                continue;
            };
            let Some((location, name)) = parameter_slot(key, target) else {
                debug!("{}: no target parameter for `{key}`", link.name);
                continue;
            };
            let value = stringify_leaves(&value);
            case.location_mut(location)
                .get_or_insert_with(JsonObject::new)
                .insert(name.to_string(), value.clone());
            transition.parameters.insert(key.clone(), value);
        }
        if let Some(template) = &link.request_body {
            match evaluate_value(template, &context) {
                Some(body) => {
                    case.body = Some(body);
                    if case.media_type.is_none() {
                        case.media_type = Some("application/json".to_string());
                    }
                }
                None => debug!("{}: request body did not resolve", link.name),
            }
        }
        Ok((case, Some(transition)))
    }
}

/// `path.id` pins the location; a bare name is looked up on the target.
fn parameter_slot<'k>(
    key: &'k str,
    target: Option<&Operation>,
) -> Option<(ParameterLocation, &'k str)> {
    if let Some((prefix, name)) = key.split_once('.') {
        let location = ParameterLocation::ALL
            .into_iter()
            .find(|location| location.as_str() == prefix);
        if let Some(location) = location {
            return Some((location, name));
        }
    }
    let parameter = target?
        .parameters
        .iter()
        .find(|parameter| parameter.name == key)?;
    Some((parameter.location, key))
}

impl<T, F> fmt::Debug for ScenarioDriver<'_, T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioDriver")
            .field("max_steps", &self.max_steps)
            .field("stopped", &self.stop.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/internal/driver_unit_tests.rs"]
mod tests;
