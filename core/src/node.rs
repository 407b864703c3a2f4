//! Normalized node view

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of node the tool manages
///
/// Types outside the well-known set are kept as `Other` so that newer tool
/// versions do not cause records to be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceType {
    Model,
    Test,
    Snapshot,
    Seed,
    Source,
    Exposure,
    Metric,
    Analysis,
    Other(String),
}

impl ResourceType {
    pub fn as_str(&self) -> &str {
        match self {
            ResourceType::Model => "model",
            ResourceType::Test => "test",
            ResourceType::Snapshot => "snapshot",
            ResourceType::Seed => "seed",
            ResourceType::Source => "source",
            ResourceType::Exposure => "exposure",
            ResourceType::Metric => "metric",
            ResourceType::Analysis => "analysis",
            ResourceType::Other(name) => name,
        }
    }

    /// True for the types accepted by the list filter
    pub fn is_known(&self) -> bool {
        !matches!(self, ResourceType::Other(_))
    }
}

impl From<&str> for ResourceType {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "model" => ResourceType::Model,
            "test" => ResourceType::Test,
            "snapshot" => ResourceType::Snapshot,
            "seed" => ResourceType::Seed,
            "source" => ResourceType::Source,
            "exposure" => ResourceType::Exposure,
            "metric" => ResourceType::Metric,
            "analysis" => ResourceType::Analysis,
            other => ResourceType::Other(other.to_string()),
        }
    }
}

impl From<String> for ResourceType {
    fn from(value: String) -> Self {
        ResourceType::from(value.as_str())
    }
}

impl From<ResourceType> for String {
    fn from(value: ResourceType) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for ResourceType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ResourceType::from(s))
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single test node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Warn,
    Fail,
    Error,
    Skip,
}

impl TestStatus {
    /// Map a status string reported by the tool
    ///
    /// Returns `None` for values outside the known vocabulary.
    pub fn from_tool(status: &str) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "pass" | "success" => Some(TestStatus::Pass),
            "warn" => Some(TestStatus::Warn),
            "fail" => Some(TestStatus::Fail),
            "error" | "runtime error" => Some(TestStatus::Error),
            "skip" | "skipped" => Some(TestStatus::Skip),
            _ => None,
        }
    }

    pub fn is_failing(&self) -> bool {
        matches!(self, TestStatus::Fail | TestStatus::Error)
    }
}

/// Per-test result attached to test nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub unique_id: String,
    pub name: String,
    pub status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    /// Present only for fail and error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failing row count, present only for fail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures: Option<u64>,
}

/// One unit of work managed by the tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub unique_id: String,
    pub fqn: String,
    pub resource_type: ResourceType,
    /// Upstream unique_ids in tool order, without duplicates or self
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_result: Option<TestResult>,
}

impl Node {
    pub fn is_test(&self) -> bool {
        self.resource_type == ResourceType::Test
    }
}

/// Aggregate test counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub warned: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
}

impl TestSummary {
    /// Count every test node by status
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        let mut summary = TestSummary::default();
        for node in nodes.into_iter().filter(|node| node.is_test()) {
            summary.record(node.test_result.as_ref().map(|result| result.status));
        }
        summary
    }

    /// Count one test; a missing status is counted as errored
    pub fn record(&mut self, status: Option<TestStatus>) {
        self.total += 1;
        match status {
            Some(TestStatus::Pass) => self.passed += 1,
            Some(TestStatus::Warn) => self.warned += 1,
            Some(TestStatus::Fail) => self.failed += 1,
            Some(TestStatus::Skip) => self.skipped += 1,
            Some(TestStatus::Error) | None => self.errored += 1,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn has_errors(&self) -> bool {
        self.errored > 0
    }

    /// Sum of the per-status buckets, always equal to `total`
    pub fn bucket_sum(&self) -> usize {
        self.passed + self.warned + self.failed + self.errored + self.skipped
    }
}
