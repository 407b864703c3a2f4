//! Client-facing error taxonomy
//!
//! Every failure the service reports is one of these kinds. HTTP statuses are
//! assigned by the api crate; this module only carries the kind and details.

use serde::Serialize;
use std::fmt;

use crate::raw::ToolFailure;

/// Stable error kind, serialized to clients as the `error` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Validation,
    Target,
    Configuration,
    Compilation,
    Execution,
    Internal,
}

impl ErrorKind {
    /// Name sent to clients
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Target => "TargetError",
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::Compilation => "CompilationError",
            ErrorKind::Execution => "ExecutionError",
            ErrorKind::Internal => "InternalError",
        }
    }

    /// TargetError is a refinement of ValidationError
    pub fn is_validation(&self) -> bool {
        matches!(self, ErrorKind::Validation | ErrorKind::Target)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single problem found while validating a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Which part of the tool's configuration is at fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigType {
    Parsing,
    ProjectFile,
    ProfileFile,
    SelectorsFile,
}

impl ConfigType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigType::Parsing => "parsing",
            ConfigType::ProjectFile => "project-file",
            ConfigType::ProfileFile => "profile-file",
            ConfigType::SelectorsFile => "selectors-file",
        }
    }

    /// File the tool reads for this configuration type
    pub fn file_name(&self) -> Option<&'static str> {
        match self {
            ConfigType::Parsing => None,
            ConfigType::ProjectFile => Some("dbt_project.yml"),
            ConfigType::ProfileFile => Some("profiles.yml"),
            ConfigType::SelectorsFile => Some("selectors.yml"),
        }
    }
}

/// A node that failed to compile or execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedNode {
    pub name: String,
    pub path: String,
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax_error: Option<String>,
}

/// Domain error raised by the core
///
/// `source` keeps the original tool failure for logs; it is never sent to
/// clients.
#[derive(Debug, thiserror::Error)]
pub enum DbtError {
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
        issues: Vec<ValidationIssue>,
    },

    #[error("{}", target_message(.provided_target, .valid_targets))]
    Target {
        provided_target: String,
        valid_targets: Vec<String>,
        #[source]
        source: Option<ToolFailure>,
    },

    #[error("{message}")]
    Configuration {
        message: String,
        config_type: ConfigType,
        config_path: Option<String>,
        search_paths: Vec<String>,
        found_paths: Vec<String>,
        #[source]
        source: Option<ToolFailure>,
    },

    #[error("{message}")]
    Compilation {
        message: String,
        failed_nodes: Vec<FailedNode>,
        #[source]
        source: Option<ToolFailure>,
    },

    #[error("{message}: {}", .command.join(" "))]
    Execution {
        message: String,
        command: Vec<String>,
        #[source]
        source: Option<ToolFailure>,
    },

    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: Option<ToolFailure>,
    },
}

fn target_message(provided: &str, valid: &[String]) -> String {
    if valid.is_empty() {
        format!("Invalid dbt target '{}'", provided)
    } else {
        format!(
            "Invalid dbt target '{}'. Valid targets: {}",
            provided,
            valid.join(", ")
        )
    }
}

impl DbtError {
    /// Validation failure built from a list of issues
    pub fn validation(issues: Vec<ValidationIssue>) -> Self {
        let field = match issues.as_slice() {
            [only] => Some(only.field.clone()),
            _ => None,
        };
        let message = issues
            .iter()
            .map(|issue| format!("{}: {}", issue.field, issue.message))
            .collect::<Vec<_>>()
            .join("; ");
        DbtError::Validation {
            message,
            field,
            issues,
        }
    }

    pub fn target(provided_target: impl Into<String>, valid_targets: Vec<String>) -> Self {
        DbtError::Target {
            provided_target: provided_target.into(),
            valid_targets,
            source: None,
        }
    }

    pub fn configuration(
        message: impl Into<String>,
        config_type: ConfigType,
        config_path: Option<String>,
    ) -> Self {
        DbtError::Configuration {
            message: message.into(),
            config_type,
            config_path,
            search_paths: Vec::new(),
            found_paths: Vec::new(),
            source: None,
        }
    }

    /// A required configuration file was not found
    pub fn config_missing(config_type: ConfigType, search_paths: Vec<String>) -> Self {
        let file = config_type.file_name().unwrap_or("configuration");
        let mut message = format!("Required configuration file '{}' not found", file);
        if !search_paths.is_empty() {
            message.push_str(&format!(" in paths: {}", search_paths.join(", ")));
        }
        DbtError::Configuration {
            message,
            config_type,
            config_path: None,
            search_paths,
            found_paths: Vec::new(),
            source: None,
        }
    }

    /// More than one copy of a configuration file was found
    pub fn config_duplicate(config_type: ConfigType, found_paths: Vec<String>) -> Self {
        let file = config_type.file_name().unwrap_or("configuration");
        DbtError::Configuration {
            message: format!(
                "Multiple '{}' files found. Please ensure that only one exists in your project.",
                file
            ),
            config_type,
            config_path: None,
            search_paths: Vec::new(),
            found_paths,
            source: None,
        }
    }

    pub fn compilation(failed_nodes: Vec<FailedNode>) -> Self {
        let message = match failed_nodes.as_slice() {
            [only] => format!("SQL compilation failed for model '{}'", only.name),
            nodes => format!(
                "SQL compilation failed for {} models: {}",
                nodes.len(),
                nodes
                    .iter()
                    .map(|node| node.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        DbtError::Compilation {
            message,
            failed_nodes,
            source: None,
        }
    }

    pub fn execution(command: Vec<String>) -> Self {
        DbtError::Execution {
            message: "dbt command execution failed".to_string(),
            command,
            source: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        DbtError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Attach the tool failure this error was derived from
    pub fn with_source(mut self, failure: Option<ToolFailure>) -> Self {
        match &mut self {
            DbtError::Validation { .. } => {}
            DbtError::Target { source, .. }
            | DbtError::Configuration { source, .. }
            | DbtError::Compilation { source, .. }
            | DbtError::Execution { source, .. }
            | DbtError::Internal { source, .. } => *source = failure,
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DbtError::Validation { .. } => ErrorKind::Validation,
            DbtError::Target { .. } => ErrorKind::Target,
            DbtError::Configuration { .. } => ErrorKind::Configuration,
            DbtError::Compilation { .. } => ErrorKind::Compilation,
            DbtError::Execution { .. } => ErrorKind::Execution,
            DbtError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// The tool failure this error was derived from, if any
    pub fn original(&self) -> Option<&ToolFailure> {
        match self {
            DbtError::Validation { .. } => None,
            DbtError::Target { source, .. }
            | DbtError::Configuration { source, .. }
            | DbtError::Compilation { source, .. }
            | DbtError::Execution { source, .. }
            | DbtError::Internal { source, .. } => source.as_ref(),
        }
    }

    /// Hint shown to clients alongside the message
    pub fn suggestion(&self) -> Option<String> {
        match self {
            DbtError::Validation { .. } => None,
            DbtError::Target { valid_targets, .. } if valid_targets.is_empty() => {
                Some("Check your profiles.yml configuration".to_string())
            }
            DbtError::Target { valid_targets, .. } => {
                Some(format!("Use one of: {}", valid_targets.join(", ")))
            }
            DbtError::Configuration { found_paths, .. } if !found_paths.is_empty() => Some(
                "Remove duplicate configuration files or set DBT_PROJECT_DIR/DBT_PROFILES_DIR"
                    .to_string(),
            ),
            DbtError::Configuration { .. } => None,
            DbtError::Compilation { .. } => {
                Some("Check your SQL syntax in the failing models".to_string())
            }
            DbtError::Execution { .. } => {
                Some("Check dbt logs for detailed error information".to_string())
            }
            DbtError::Internal { .. } => Some(
                "This may be a temporary issue. Please try again or contact support if the problem persists."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::FailureKind;
    use std::error::Error as _;

    #[test]
    fn test_target_message_lists_valid_targets() {
        let err = DbtError::target("bad", vec!["dev".to_string(), "prod".to_string()]);
        assert_eq!(
            err.to_string(),
            "Invalid dbt target 'bad'. Valid targets: dev, prod"
        );
        assert_eq!(err.suggestion().as_deref(), Some("Use one of: dev, prod"));
        assert!(err.kind().is_validation());
    }

    #[test]
    fn test_source_is_preserved() {
        let failure = ToolFailure::new(FailureKind::Runtime, "boom");
        let err = DbtError::execution(vec!["run".to_string()]).with_source(Some(failure.clone()));

        assert_eq!(err.original(), Some(&failure));
        assert!(err.source().is_some());
        assert_eq!(err.kind(), ErrorKind::Execution);
    }

    #[test]
    fn test_compilation_message_counts_models() {
        let node = |name: &str| FailedNode {
            name: name.to_string(),
            path: format!("models/{}.sql", name),
            error_message: "bad".to_string(),
            syntax_error: None,
        };

        let single = DbtError::compilation(vec![node("orders")]);
        assert_eq!(single.to_string(), "SQL compilation failed for model 'orders'");

        let many = DbtError::compilation(vec![node("orders"), node("customers")]);
        assert_eq!(
            many.to_string(),
            "SQL compilation failed for 2 models: orders, customers"
        );
    }

    #[test]
    fn test_validation_single_issue_sets_field() {
        let err = DbtError::validation(vec![ValidationIssue::new("target", "must not be empty")]);
        match err {
            DbtError::Validation { field, issues, .. } => {
                assert_eq!(field.as_deref(), Some("target"));
                assert_eq!(issues.len(), 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_config_missing_mentions_file() {
        let err = DbtError::config_missing(ConfigType::ProfileFile, vec!["/srv".to_string()]);
        assert_eq!(
            err.to_string(),
            "Required configuration file 'profiles.yml' not found in paths: /srv"
        );
    }
}
