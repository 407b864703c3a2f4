//! Raw invocation outcome
//!
//! What the tool adapter hands back after one invocation, before any
//! interpretation. The payload shape depends on the verb that ran.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse category of a tool-level failure
///
/// Assigned by the adapter from the tool's own output so that nothing past
/// the adapter depends on tool-specific exception types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Project files could not be parsed
    Parsing,
    /// dbt_project.yml is invalid
    Project,
    /// profiles.yml is invalid or does not contain the requested profile/target
    Profile,
    /// The tool started but failed while running
    Runtime,
    /// The tool could not be started or its artifacts could not be read
    Io,
    Unknown,
}

impl FailureKind {
    /// Failures rooted in the tool's configuration files
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            FailureKind::Parsing | FailureKind::Project | FailureKind::Profile
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Parsing => "parsing",
            FailureKind::Project => "project",
            FailureKind::Profile => "profile",
            FailureKind::Runtime => "runtime",
            FailureKind::Io => "io",
            FailureKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured description of an underlying tool failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} failure: {message}")]
pub struct ToolFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ToolFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Node descriptor wrapped by an execution outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub unique_id: String,
    pub name: String,
    pub resource_type: String,
    /// Hierarchical name segments, joined with '.' to form the FQN
    #[serde(default)]
    pub fqn: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub original_file_path: Option<String>,
}

/// Outcome of one node in a run/test/build/compile invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub node: NodeDescriptor,
    /// Status exactly as the tool reported it (e.g. "success", "fail")
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub failures: Option<u64>,
    #[serde(default)]
    pub execution_time: Option<f64>,
}

impl RunOutcome {
    /// Whether the tool marked this node as errored
    pub fn is_error(&self) -> bool {
        self.status.eq_ignore_ascii_case("error")
    }
}

/// Verb-dependent result payload
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// One JSON-encoded record per node, in tool order (list)
    FlatList(Vec<String>),
    /// One outcome per executed node (run/test/build/compile)
    Execution(Vec<RunOutcome>),
}

impl RawPayload {
    pub fn len(&self) -> usize {
        match self {
            RawPayload::FlatList(records) => records.len(),
            RawPayload::Execution(outcomes) => outcomes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unnormalized outcome of a single invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RawResult {
    pub success: bool,
    pub exception: Option<ToolFailure>,
    pub payload: Option<RawPayload>,
    /// Text the tool printed while running
    pub output: String,
}

impl RawResult {
    pub fn succeeded(payload: RawPayload) -> Self {
        Self {
            success: true,
            exception: None,
            payload: Some(payload),
            output: String::new(),
        }
    }

    pub fn failed(exception: Option<ToolFailure>, payload: Option<RawPayload>) -> Self {
        Self {
            success: false,
            exception,
            payload,
            output: String::new(),
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Execution outcomes, if this result carries them
    pub fn outcomes(&self) -> &[RunOutcome] {
        match &self.payload {
            Some(RawPayload::Execution(outcomes)) => outcomes,
            _ => &[],
        }
    }
}
