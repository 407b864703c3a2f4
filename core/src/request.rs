//! Command requests and their cross-field validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{DbtError, ValidationIssue};
use crate::node::ResourceType;

/// dbt subcommand exposed over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Run,
    Test,
    Build,
    List,
    Compile,
    Unsafe,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Run => "run",
            Verb::Test => "test",
            Verb::Build => "build",
            Verb::List => "list",
            Verb::Compile => "compile",
            Verb::Unsafe => "unsafe",
        }
    }

    /// Verbs whose results include test outcomes
    pub fn is_test_bearing(&self) -> bool {
        matches!(self, Verb::Test | Verb::Build)
    }

    pub fn accepts_full_refresh(&self) -> bool {
        matches!(self, Verb::Run | Verb::Build)
    }

    pub fn accepts_fail_fast(&self) -> bool {
        matches!(self, Verb::Run | Verb::Test | Verb::Build)
    }

    pub fn accepts_store_failures(&self) -> bool {
        self.is_test_bearing()
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "run" => Ok(Verb::Run),
            "test" => Ok(Verb::Test),
            "build" => Ok(Verb::Build),
            "list" | "ls" => Ok(Verb::List),
            "compile" => Ok(Verb::Compile),
            "unsafe" => Ok(Verb::Unsafe),
            other => Err(format!("Unknown dbt verb: {}", other)),
        }
    }
}

/// Boolean switches forwarded to the tool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOptions {
    pub full_refresh: bool,
    pub fail_fast: bool,
    pub store_failures: bool,
    /// Respond 422 when any test fails or errors
    pub strict: bool,
}

/// A command request after wire decoding
///
/// Construct with [`CommandRequest::new`] and the `with_*` methods, then call
/// [`CommandRequest::validate`] before building arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub verb: Verb,
    pub target: String,
    pub select: Vec<String>,
    pub exclude: Vec<String>,
    pub selector: Option<String>,
    pub resource_type: Option<ResourceType>,
    pub options: CommandOptions,
}

impl CommandRequest {
    pub fn new(verb: Verb, target: impl Into<String>) -> Self {
        Self {
            verb,
            target: target.into(),
            select: Vec::new(),
            exclude: Vec::new(),
            selector: None,
            resource_type: None,
            options: CommandOptions::default(),
        }
    }

    pub fn with_select<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = Some(resource_type);
        self
    }

    pub fn with_options(mut self, options: CommandOptions) -> Self {
        self.options = options;
        self
    }

    /// Human-readable description of the node selection
    pub fn selection_criteria(&self) -> String {
        let mut parts = Vec::new();
        if !self.select.is_empty() {
            parts.push(format!("select_args: {}", self.select.join(" ")));
        }
        if !self.exclude.is_empty() {
            parts.push(format!("exclude_args: {}", self.exclude.join(" ")));
        }
        if let Some(selector) = &self.selector {
            parts.push(format!("selector_args: {}", selector));
        }
        if parts.is_empty() {
            "no selection criteria".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Collect every cross-field problem with this request
    pub fn validation_issues(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.verb == Verb::Unsafe {
            issues.push(ValidationIssue::new(
                "verb",
                "unsafe commands are submitted as raw command strings",
            ));
        }

        if self.target.is_empty() {
            issues.push(ValidationIssue::new("target", "must not be empty"));
        } else if !is_identifier(&self.target) {
            issues.push(ValidationIssue::new(
                "target",
                "may only contain letters, digits and underscores",
            ));
        }

        check_tokens(&mut issues, "select_args", &self.select);
        check_tokens(&mut issues, "exclude_args", &self.exclude);

        if let Some(selector) = &self.selector {
            if !is_selection_token(selector) {
                issues.push(ValidationIssue::new(
                    "selector_args",
                    "must be a single selector name",
                ));
            }
            if !self.select.is_empty() || !self.exclude.is_empty() {
                issues.push(ValidationIssue::new(
                    "selector_args",
                    "'select_args' and 'exclude_args' are mutually exclusive with 'selector_args'",
                ));
            }
        }

        match &self.resource_type {
            Some(_) if self.verb != Verb::List => issues.push(ValidationIssue::new(
                "resource_type",
                format!("not supported for '{}'", self.verb),
            )),
            Some(resource_type) if !resource_type.is_known() => {
                issues.push(ValidationIssue::new(
                    "resource_type",
                    format!("unknown resource type '{}'", resource_type),
                ))
            }
            _ => {}
        }

        let options = &self.options;
        if options.full_refresh && !self.verb.accepts_full_refresh() {
            issues.push(option_issue("full_refresh", self.verb));
        }
        if options.fail_fast && !self.verb.accepts_fail_fast() {
            issues.push(option_issue("fail_fast", self.verb));
        }
        if options.store_failures && !self.verb.accepts_store_failures() {
            issues.push(option_issue("store_failures", self.verb));
        }
        if options.strict && !self.verb.is_test_bearing() {
            issues.push(option_issue("strict", self.verb));
        }

        issues
    }

    /// Reject contradictory or malformed requests before any invocation
    pub fn validate(&self) -> Result<(), DbtError> {
        let issues = self.validation_issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(DbtError::validation(issues))
        }
    }
}

fn is_identifier(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Non-empty, no whitespace, and never read by dbt as a flag
fn is_selection_token(token: &str) -> bool {
    !token.is_empty() && !token.starts_with('-') && !token.chars().any(char::is_whitespace)
}

fn check_tokens(issues: &mut Vec<ValidationIssue>, field: &str, tokens: &[String]) {
    if !tokens.iter().all(|token| is_selection_token(token)) {
        issues.push(ValidationIssue::new(
            field,
            "selection tokens must be non-empty, contain no whitespace and not start with '-'",
        ));
    }
}

fn option_issue(option: &str, verb: Verb) -> ValidationIssue {
    ValidationIssue::new(option, format!("not supported for '{}'", verb))
}

/// Split a space-separated selection string into tokens
pub fn split_tokens(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_and_select_are_mutually_exclusive() {
        let request = CommandRequest::new(Verb::Run, "dev")
            .with_select(["orders"])
            .with_selector("nightly");

        let issues = request.validation_issues();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("mutually exclusive"));
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_selector_and_exclude_are_mutually_exclusive() {
        let request = CommandRequest::new(Verb::Build, "dev")
            .with_exclude(["legacy"])
            .with_selector("nightly");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_flag_like_select_tokens_rejected() {
        let request = CommandRequest::new(Verb::Run, "dev")
            .with_select(["orders", "--profiles-dir", "/tmp/elsewhere"]);
        let issues = request.validation_issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "select_args");

        let request = CommandRequest::new(Verb::Run, "dev").with_exclude(["-t"]);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_flag_like_selector_rejected() {
        let request = CommandRequest::new(Verb::Run, "dev").with_selector("--full-refresh");
        let issues = request.validation_issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "selector_args");
    }

    #[test]
    fn test_target_must_be_identifier_safe() {
        for target in ["", "dev prod", "dev;rm", "prod-eu"] {
            let request = CommandRequest::new(Verb::Run, target);
            assert!(request.validate().is_err(), "target {:?} accepted", target);
        }
        assert!(CommandRequest::new(Verb::Run, "prod_eu_2").validate().is_ok());
    }

    #[test]
    fn test_resource_type_only_for_list() {
        let request = CommandRequest::new(Verb::Run, "dev").with_resource_type(ResourceType::Model);
        assert!(request.validate().is_err());

        let request = CommandRequest::new(Verb::List, "dev").with_resource_type(ResourceType::Model);
        assert!(request.validate().is_ok());

        let request = CommandRequest::new(Verb::List, "dev")
            .with_resource_type(ResourceType::Other("widget".to_string()));
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_options_checked_against_verb() {
        let options = CommandOptions {
            strict: true,
            ..CommandOptions::default()
        };
        assert!(CommandRequest::new(Verb::Run, "dev")
            .with_options(options)
            .validate()
            .is_err());
        assert!(CommandRequest::new(Verb::Test, "dev")
            .with_options(options)
            .validate()
            .is_ok());

        let options = CommandOptions {
            full_refresh: true,
            ..CommandOptions::default()
        };
        assert!(CommandRequest::new(Verb::Compile, "dev")
            .with_options(options)
            .validate()
            .is_err());
    }

    #[test]
    fn test_selection_criteria_string() {
        let request = CommandRequest::new(Verb::Run, "dev")
            .with_select(["orders", "tag:daily"])
            .with_exclude(["legacy"]);
        assert_eq!(
            request.selection_criteria(),
            "select_args: orders tag:daily, exclude_args: legacy"
        );
        assert_eq!(
            CommandRequest::new(Verb::Run, "dev").selection_criteria(),
            "no selection criteria"
        );
    }

    #[test]
    fn test_verb_parsing_accepts_ls() {
        assert_eq!("ls".parse::<Verb>(), Ok(Verb::List));
        assert!("seed".parse::<Verb>().is_err());
    }
}
