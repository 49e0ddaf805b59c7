use std::collections::HashMap;

use log::debug;

use super::{Response, Transition};
use crate::{Case, CaseId};

/// A recorded case with its origin and, once known, its response.
#[derive(Clone, Debug, PartialEq)]
pub struct CaseNode {
    pub case: Case,
    pub transition: Option<Transition>,
    pub response: Option<Response>,
}

/// Append-only record of the cases of one scenario, in execution order.
#[derive(Clone, Debug, Default)]
pub struct ScenarioRecorder {
    order: Vec<CaseId>,
    cases: HashMap<CaseId, CaseNode>,
}

impl ScenarioRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `case`; returns `false` when its id was already recorded or
    /// its parent was not. Parents always precede children, so the ancestor
    /// chain of every case ends at a root.
    pub fn record_case(&mut self, case: Case, transition: Option<Transition>) -> bool {
        if self.cases.contains_key(&case.id) {
            debug!("case {} is already recorded", case.id);
            return false;
        }
        if let Some(transition) = &transition {
            if !self.cases.contains_key(&transition.parent_id) {
                debug!(
                    "case {} names unrecorded parent {}",
                    case.id, transition.parent_id
                );
                return false;
            }
        }
        self.order.push(case.id.clone());
        self.cases.insert(
            case.id.clone(),
            CaseNode {
                case,
                transition,
                response: None,
            },
        );
        true
    }

    /// Attaches the response of a recorded case; `false` for unknown ids.
    pub fn record_response(&mut self, case_id: &CaseId, response: Response) -> bool {
        match self.cases.get_mut(case_id) {
            Some(node) => {
                node.response = Some(response);
                true
            }
            None => {
                debug!("response for unknown case {case_id}");
                false
            }
        }
    }

    pub fn get(&self, case_id: &CaseId) -> Option<&CaseNode> {
        self.cases.get(case_id)
    }

    pub fn find_parent(&self, case_id: &CaseId) -> Option<&CaseNode> {
        let transition = self.get(case_id)?.transition.as_ref()?;
        self.get(&transition.parent_id)
    }

    /// Ancestors nearest-first, then cases sharing the same parent.
    pub fn find_related(&self, case_id: &CaseId) -> Related<'_> {
        Related {
            recorder: self,
            origin: case_id.clone(),
            state: RelatedState::Ancestors(case_id.clone()),
            limit: self.order.len(),
        }
    }

    /// Recorded cases in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &CaseNode> {
        self.order.iter().filter_map(|id| self.cases.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

enum RelatedState {
    /// Walking up from this case.
    Ancestors(CaseId),
    /// Scanning execution order for children of `parent` from `next`.
    Siblings { parent: CaseId, next: usize },
    Done,
}

/// Lazy walk over the cases related to one case.
pub struct Related<'a> {
    recorder: &'a ScenarioRecorder,
    origin: CaseId,
    state: RelatedState,
    /// Recorder size when the walk started.
    limit: usize,
}

impl<'a> Iterator for Related<'a> {
    type Item = &'a CaseNode;

    fn next(&mut self) -> Option<&'a CaseNode> {
        let recorder = self.recorder;
        loop {
            match &mut self.state {
                RelatedState::Ancestors(current) => {
                    match recorder.find_parent(current) {
                        Some(parent) => {
                            *current = parent.case.id.clone();
                            return Some(parent);
                        }
                        None => {
                            let parent = recorder
                                .get(&self.origin)
                                .and_then(|node| node.transition.as_ref())
                                .map(|transition| transition.parent_id.clone());
                            self.state = match parent {
                                Some(parent) => RelatedState::Siblings { parent, next: 0 },
                                None => RelatedState::Done,
                            };
                        }
                    }
                }
                RelatedState::Siblings { parent, next } => {
                    while *next < self.limit {
                        let id = &recorder.order[*next];
                        *next += 1;
                        if *id == self.origin {
                            continue;
                        }
                        let Some(node) = recorder.cases.get(id) else {
                            continue;
                        };
                        if node
                            .transition
                            .as_ref()
                            .is_some_and(|transition| transition.parent_id == *parent)
                        {
                            return Some(node);
                        }
                    }
                    self.state = RelatedState::Done;
                }
                RelatedState::Done => return None,
            }
        }
    }
}
