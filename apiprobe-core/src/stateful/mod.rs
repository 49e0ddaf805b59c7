//! Link-driven stateful scenarios: bookkeeping, gating and execution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{Case, CaseId};

mod control;
mod driver;
pub mod expressions;
mod recorder;
mod transitions;

pub use control::{
    active_sources, SourceBuckets, Statistics, TargetCounts, TransitionController,
    MAX_OPERATIONS_PER_SOURCE, MAX_ROOT_SOURCES,
};
pub use driver::{
    CaseFactory, RandomCaseFactory, ScenarioDriver, ScenarioStep, ScenarioTrace, StopReason,
    Transport, TransportError,
};
pub use recorder::{CaseNode, Related, ScenarioRecorder};
pub use transitions::{ApiTransitions, LinkDefinition, OperationTransitions};

/// What the service answered to one case.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<JsonValue>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Header value, matching the name case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// How a case was derived from an earlier one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Name of the link that was followed.
    pub link: String,
    pub parent_id: CaseId,
    /// Link parameters that resolved, as applied to the case.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, JsonValue>,
}

/// One executed step as seen by the controller.
#[derive(Clone, Debug, PartialEq)]
pub struct StepInput {
    pub case: Case,
    pub transition: Option<Transition>,
}

impl StepInput {
    pub fn root(case: Case) -> Self {
        Self {
            case,
            transition: None,
        }
    }

    pub fn derived(case: Case, transition: Transition) -> Self {
        Self {
            case,
            transition: Some(transition),
        }
    }
}
