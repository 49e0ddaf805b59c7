use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A declared link from one operation's response to another operation's request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkDefinition {
    pub name: String,
    /// Label of the operation whose response feeds the link.
    pub source: String,
    /// Label of the operation the link leads to.
    pub target: String,
    /// `default`, an exact code such as `201`, or a range such as `2XX`.
    #[serde(default = "default_status_code")]
    pub status_code: String,
    /// Target parameter (`id`, or `path.id` to pin the location) to expression.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<JsonValue>,
}

fn default_status_code() -> String {
    "default".to_string()
}

impl LinkDefinition {
    /// Name of the bundle collecting source cases this link can start from.
    pub fn bundle_name(&self) -> String {
        format!("{} -> {} -> {}", self.source, self.status_code, self.target)
    }

    pub fn matches_status(&self, status: u16) -> bool {
        let code = self.status_code.as_str();
        if code.eq_ignore_ascii_case("default") {
            return true;
        }
        let status = status.to_string();
        code.len() == status.len()
            && code
                .chars()
                .zip(status.chars())
                .all(|(expected, actual)| expected.eq_ignore_ascii_case(&'x') || expected == actual)
    }
}

/// Links touching one operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperationTransitions {
    pub incoming: Vec<LinkDefinition>,
    pub outgoing: Vec<LinkDefinition>,
}

/// Link graph keyed by operation label.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ApiTransitions {
    operations: BTreeMap<String, OperationTransitions>,
}

impl ApiTransitions {
    pub fn from_links(links: impl IntoIterator<Item = LinkDefinition>) -> Self {
        let mut operations: BTreeMap<String, OperationTransitions> = BTreeMap::new();
        for link in links {
            operations
                .entry(link.target.clone())
                .or_default()
                .incoming
                .push(link.clone());
            operations
                .entry(link.source.clone())
                .or_default()
                .outgoing
                .push(link);
        }
        Self { operations }
    }

    pub fn get(&self, label: &str) -> Option<&OperationTransitions> {
        self.operations.get(label)
    }

    pub fn has_outgoing(&self, label: &str) -> bool {
        self.get(label)
            .is_some_and(|transitions| !transitions.outgoing.is_empty())
    }

    pub fn outgoing(&self, label: &str) -> &[LinkDefinition] {
        self.get(label)
            .map(|transitions| transitions.outgoing.as_slice())
            .unwrap_or_default()
    }

    pub fn operations(&self) -> impl Iterator<Item = (&String, &OperationTransitions)> {
        self.operations.iter()
    }

    /// Every link once, grouped by source label.
    pub fn links(&self) -> impl Iterator<Item = &LinkDefinition> {
        self.operations
            .values()
            .flat_map(|transitions| transitions.outgoing.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
