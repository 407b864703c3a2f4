//! Result normalizer
//!
//! Converts either payload shape into the same `Node` list. The verb decides
//! which shape is expected; a mismatch is an internal error, never a guess.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::DbtError;
use crate::node::{Node, ResourceType, TestResult, TestStatus, TestSummary};
use crate::raw::{RawPayload, RawResult, RunOutcome};
use crate::request::Verb;

/// Uniform view of one invocation's nodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub nodes: Vec<Node>,
    /// Present only for test-bearing verbs
    pub test_summary: Option<TestSummary>,
    /// Records that could not be decoded and were left out
    pub skipped_records: usize,
}

impl Normalized {
    pub fn test_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.is_test())
    }
}

#[derive(Debug, Deserialize)]
struct ListRecord {
    unique_id: String,
    resource_type: String,
    name: String,
    #[serde(default)]
    depends_on: ListDependsOn,
}

#[derive(Debug, Default, Deserialize)]
struct ListDependsOn {
    #[serde(default)]
    nodes: Vec<String>,
}

/// Normalize a raw result produced by `verb`
pub fn normalize(verb: Verb, raw: &RawResult) -> Result<Normalized, DbtError> {
    let mut normalized = match &raw.payload {
        None => Normalized::default(),
        Some(RawPayload::FlatList(records)) if verb == Verb::List => from_list_records(records),
        Some(RawPayload::Execution(outcomes)) if verb != Verb::List => {
            from_outcomes(verb, outcomes)
        }
        Some(RawPayload::FlatList(_)) | Some(RawPayload::Execution(_)) => {
            return Err(DbtError::internal(format!(
                "unexpected result shape for '{}'",
                verb
            )));
        }
    };

    if verb.is_test_bearing() {
        normalized.test_summary = Some(TestSummary::from_nodes(&normalized.nodes));
    }

    debug!(
        verb = %verb,
        nodes = normalized.nodes.len(),
        skipped = normalized.skipped_records,
        "Normalized dbt result"
    );
    Ok(normalized)
}

fn from_list_records(records: &[String]) -> Normalized {
    let mut normalized = Normalized::default();

    for (index, record) in records.iter().enumerate() {
        match serde_json::from_str::<ListRecord>(record) {
            Ok(decoded) => {
                let depends_on = upstream_ids(&decoded.unique_id, decoded.depends_on.nodes);
                normalized.nodes.push(Node {
                    unique_id: decoded.unique_id,
                    fqn: decoded.name,
                    resource_type: ResourceType::from(decoded.resource_type),
                    depends_on,
                    test_result: None,
                });
            }
            Err(e) => {
                warn!(record = index, error = %e, "Skipping undecodable list record");
                normalized.skipped_records += 1;
            }
        }
    }

    normalized
}

fn from_outcomes(verb: Verb, outcomes: &[RunOutcome]) -> Normalized {
    let nodes = outcomes
        .iter()
        .map(|outcome| {
            let descriptor = &outcome.node;
            let resource_type = ResourceType::from(descriptor.resource_type.as_str());
            let test_result = if verb.is_test_bearing() && resource_type == ResourceType::Test {
                Some(test_result(outcome))
            } else {
                None
            };
            let fqn = if descriptor.fqn.is_empty() {
                descriptor.name.clone()
            } else {
                descriptor.fqn.join(".")
            };

            Node {
                unique_id: descriptor.unique_id.clone(),
                fqn,
                resource_type,
                depends_on: upstream_ids(&descriptor.unique_id, descriptor.depends_on.clone()),
                test_result,
            }
        })
        .collect();

    Normalized {
        nodes,
        test_summary: None,
        skipped_records: 0,
    }
}

fn test_result(outcome: &RunOutcome) -> TestResult {
    let (status, message) = match TestStatus::from_tool(&outcome.status) {
        Some(status) => (status, outcome.message.clone()),
        None => {
            warn!(
                unique_id = %outcome.node.unique_id,
                status = %outcome.status,
                "Unrecognized test status, counting as error"
            );
            let message = outcome
                .message
                .clone()
                .unwrap_or_else(|| format!("unrecognized test status '{}'", outcome.status));
            (TestStatus::Error, Some(message))
        }
    };

    TestResult {
        unique_id: outcome.node.unique_id.clone(),
        name: outcome.node.name.clone(),
        status,
        execution_time: outcome.execution_time.filter(|secs| *secs >= 0.0),
        message: if status.is_failing() {
            Some(message.unwrap_or_else(|| format!("test {}", outcome.status)))
        } else {
            None
        },
        failures: if status == TestStatus::Fail {
            outcome.failures
        } else {
            None
        },
    }
}

/// Upstream ids in first-seen order, without duplicates or the node itself
fn upstream_ids(unique_id: &str, candidates: Vec<String>) -> Vec<String> {
    let mut ids: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if candidate != unique_id && !ids.contains(&candidate) {
            ids.push(candidate);
        }
    }
    ids
}
