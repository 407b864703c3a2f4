//! Wire models for the HTTP surface

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dbtserve_core::request::split_tokens;
use dbtserve_core::{
    CommandOptions, CommandRequest, Node, ResourceType, TestResult, TestSummary, Verb,
};

/// Server bind and identity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub version: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Selection tokens, either space-separated or already split
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SelectionArg {
    Joined(String),
    Tokens(Vec<String>),
}

impl SelectionArg {
    pub fn into_tokens(self) -> Vec<String> {
        match self {
            SelectionArg::Joined(raw) => split_tokens(&raw),
            SelectionArg::Tokens(tokens) => tokens,
        }
    }
}

/// Body accepted by every structured command endpoint
///
/// Options a verb does not support are rejected during validation rather
/// than ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandBody {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub select_args: Option<SelectionArg>,
    #[serde(default)]
    pub exclude_args: Option<SelectionArg>,
    #[serde(default)]
    pub selector_args: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub full_refresh: bool,
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default)]
    pub store_failures: bool,
    #[serde(default)]
    pub strict: bool,
}

impl CommandBody {
    /// Build the core request, falling back to `default_target`
    pub fn into_request(self, verb: Verb, default_target: &str) -> CommandRequest {
        let mut request = CommandRequest::new(
            verb,
            self.target.unwrap_or_else(|| default_target.to_string()),
        )
        .with_options(CommandOptions {
            full_refresh: self.full_refresh,
            fail_fast: self.fail_fast,
            store_failures: self.store_failures,
            strict: self.strict,
        });

        if let Some(select) = self.select_args {
            request = request.with_select(select.into_tokens());
        }
        if let Some(exclude) = self.exclude_args {
            request = request.with_exclude(exclude.into_tokens());
        }
        if let Some(selector) = self.selector_args {
            request = request.with_selector(selector);
        }
        if let Some(resource_type) = self.resource_type {
            request = request.with_resource_type(ResourceType::from(resource_type));
        }
        request
    }
}

/// Body of the raw command endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnsafeCommandBody {
    pub unsafe_dbt_cli_command: String,
}

/// Metadata attached to every command response
#[derive(Debug, Clone, Serialize)]
pub struct ResponseMetadata {
    pub command: Verb,
    pub dbt_command: String,
    pub target: String,
    pub nodes_processed: usize,
    pub selection_criteria: String,
    pub invocation_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub skipped_records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_test_failures: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_test_errors: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    pub nodes: Vec<Node>,
    pub metadata: ResponseMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_summary: Option<TestSummary>,
}

/// 422 body for strict test/build runs with failing tests
#[derive(Debug, Clone, Serialize)]
pub struct StrictFailureResponse {
    pub success: bool,
    pub error: &'static str,
    pub message: String,
    pub failed_tests: Vec<TestResult>,
    pub passed_tests: Vec<TestResult>,
    pub test_summary: TestSummary,
    pub metadata: ResponseMetadata,
}

impl StrictFailureResponse {
    pub fn new(nodes: &[Node], test_summary: TestSummary, metadata: ResponseMetadata) -> Self {
        let (failed_tests, passed_tests): (Vec<TestResult>, Vec<TestResult>) = nodes
            .iter()
            .filter_map(|node| node.test_result.clone())
            .partition(|result| result.status.is_failing());

        Self {
            success: false,
            error: "TestFailure",
            message: format!(
                "{} of {} tests failed or errored",
                test_summary.failed + test_summary.errored,
                test_summary.total
            ),
            failed_tests,
            passed_tests,
            test_summary,
            metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnsafeMetadata {
    pub dbt_command: String,
    pub invocation_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnsafeResponse {
    pub success: bool,
    pub status: &'static str,
    pub output: String,
    pub nodes: Vec<Node>,
    pub metadata: UnsafeMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub profiles_dir: String,
    pub project_dir: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: String,
    pub docs: &'static str,
}
