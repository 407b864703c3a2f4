//! Outcome classifier
//!
//! Decides whether a raw result is a usable success or one of the typed
//! failures. Runs before normalization; it only reads the result.

use serde::Serialize;
use tracing::debug;

use crate::args::{DbtPaths, InvocationArgs};
use crate::errors::{DbtError, FailedNode};
use crate::node::ResourceType;
use crate::patterns;
use crate::raw::{RawResult, RunOutcome};
use crate::request::Verb;
use crate::translate::translate;

/// Everything known about an invocation besides its result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationContext {
    pub verb: Verb,
    /// Target named on the command line; raw commands may omit it
    pub target: Option<String>,
    pub args: InvocationArgs,
    pub paths: DbtPaths,
}

impl InvocationContext {
    pub fn new(verb: Verb, target: impl Into<String>, args: InvocationArgs, paths: DbtPaths) -> Self {
        Self {
            verb,
            target: Some(target.into()),
            args,
            paths,
        }
    }

    /// Context for a raw command, picking the target out of its arguments
    pub fn for_raw_command(args: InvocationArgs, paths: DbtPaths) -> Self {
        let target = raw_target(args.as_slice());
        Self {
            verb: Verb::Unsafe,
            target,
            args,
            paths,
        }
    }

    /// Target for error reporting
    pub fn target_or_unknown(&self) -> &str {
        self.target.as_deref().unwrap_or("unknown")
    }
}

/// `--target X`, `-t X` or `--target=X`
fn raw_target(tokens: &[String]) -> Option<String> {
    tokens.iter().enumerate().find_map(|(i, token)| {
        if let Some(value) = token.strip_prefix("--target=") {
            return Some(value.to_string());
        }
        if token == "--target" || token == "-t" {
            return tokens.get(i + 1).cloned();
        }
        None
    })
}

/// Classify a raw result; `Ok(())` means the result may be normalized
pub fn classify(ctx: &InvocationContext, raw: &RawResult) -> Result<(), DbtError> {
    if raw.success {
        return Ok(());
    }

    let exception_text = raw.exception.as_ref().map(|e| e.message.as_str());
    let target_text = exception_text
        .filter(|text| patterns::is_target_not_found(text))
        .or_else(|| Some(raw.output.as_str()).filter(|text| patterns::is_target_not_found(text)));
    if let Some(text) = target_text {
        return Err(
            DbtError::target(ctx.target_or_unknown(), patterns::valid_targets(text))
                .with_source(raw.exception.clone()),
        );
    }

    if let Some(failure) = raw.exception.as_ref().filter(|e| e.kind.is_structural()) {
        return Err(translate(failure, ctx));
    }

    if ctx.verb != Verb::List {
        let outcomes = raw.outcomes();

        if raw.exception.is_none() && ctx.verb.is_test_bearing() && only_tests_failed(outcomes) {
            debug!(verb = %ctx.verb, "Only test nodes failed, reporting through summary");
            return Ok(());
        }

        let failed_nodes = failed_nodes(outcomes);
        if !failed_nodes.is_empty() {
            return Err(DbtError::compilation(failed_nodes).with_source(raw.exception.clone()));
        }
    }

    Err(DbtError::execution(ctx.args.to_vec()).with_source(raw.exception.clone()))
}

fn is_failing(outcome: &RunOutcome) -> bool {
    outcome.is_error() || outcome.status.eq_ignore_ascii_case("fail")
}

fn is_test(outcome: &RunOutcome) -> bool {
    ResourceType::from(outcome.node.resource_type.as_str()) == ResourceType::Test
}

/// At least one failing outcome, and every failing outcome is a test
fn only_tests_failed(outcomes: &[RunOutcome]) -> bool {
    let mut failing = outcomes.iter().filter(|outcome| is_failing(outcome)).peekable();
    failing.peek().is_some() && failing.all(is_test)
}

/// One entry per node the tool marked as errored
pub fn failed_nodes(outcomes: &[RunOutcome]) -> Vec<FailedNode> {
    outcomes
        .iter()
        .filter(|outcome| outcome.is_error())
        .map(|outcome| {
            let error_message = outcome
                .message
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string());
            FailedNode {
                name: outcome.node.name.clone(),
                path: outcome
                    .node
                    .original_file_path
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                syntax_error: patterns::syntax_error_line(&error_message),
                error_message,
            }
        })
        .collect()
}
