use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use super::recorder::ScenarioRecorder;
use super::transitions::ApiTransitions;
use super::StepInput;
use crate::CaseId;

/// Derived calls of one target allowed per source operation in a scenario.
pub const MAX_OPERATIONS_PER_SOURCE: usize = 2;

/// Distinct source cases (e.g. created users) kept open per operation.
pub const MAX_ROOT_SOURCES: usize = 2;

/// Target label -> number of derived calls.
pub type TargetCounts = BTreeMap<String, usize>;

/// Source case id -> its derived calls.
pub type SourceBuckets = BTreeMap<CaseId, TargetCounts>;

/// Source label -> its open source cases.
pub type Statistics = BTreeMap<String, SourceBuckets>;

/// Source labels owning a non-empty bundle named `"{source} -> {status} -> {target}"`.
pub fn active_sources<V>(bundles: &BTreeMap<String, Vec<V>>) -> BTreeSet<String> {
    bundles
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .filter_map(|(name, _)| name.split("->").next())
        .map(|source| source.trim().to_string())
        .collect()
}

/// Gates which transitions a scenario may take next.
#[derive(Clone, Debug)]
pub struct TransitionController<'a> {
    transitions: &'a ApiTransitions,
    statistic: Statistics,
}

impl<'a> TransitionController<'a> {
    pub fn new(transitions: &'a ApiTransitions) -> Self {
        Self {
            transitions,
            statistic: Statistics::new(),
        }
    }

    pub fn statistic(&self) -> &Statistics {
        &self.statistic
    }

    /// Accounts for an executed step.
    pub fn record_step(&mut self, input: &StepInput, recorder: &ScenarioRecorder) {
        let case = &input.case;
        if self.transitions.has_outgoing(&case.operation) {
            self.statistic
                .entry(case.operation.clone())
                .or_default()
                .insert(case.id.clone(), TargetCounts::new());
        }
        let Some(transition) = &input.transition else {
            return;
        };
        let Some(parent) = recorder.get(&transition.parent_id) else {
            debug!("parent {} of {} is not recorded", transition.parent_id, case.id);
            return;
        };
        if let Some(counts) = self
            .statistic
            .get_mut(&parent.case.operation)
            .and_then(|buckets| buckets.get_mut(&parent.case.id))
        {
            *counts.entry(case.operation.clone()).or_default() += 1;
        }
    }

    /// Whether `source` may lead to `target` once more.
    pub fn allow_transition(&self, source: &str, target: &str) -> bool {
        let total: usize = self
            .statistic
            .get(source)
            .map(|buckets| {
                buckets
                    .values()
                    .map(|counts| counts.get(target).copied().unwrap_or(0))
                    .sum()
            })
            .unwrap_or(0);
        total < MAX_OPERATIONS_PER_SOURCE
    }

    /// Whether a fresh, unlinked call of `source` is allowed.
    ///
    /// Past the root cap this still answers `true` when no incoming edge of
    /// any operation can be taken, so a scenario never stalls.
    pub fn allow_root_transition(&self, source: &str, active: &BTreeSet<String>) -> bool {
        let open = self.statistic.get(source).map_or(0, BTreeMap::len);
        if open < MAX_ROOT_SOURCES {
            return true;
        }
        self.transitions
            .operations()
            .flat_map(|(_, transitions)| transitions.incoming.iter())
            .all(|link| {
                !active.contains(&link.source) || !self.allow_transition(&link.source, &link.target)
            })
    }
}
