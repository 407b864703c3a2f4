//! Argument builder
//!
//! Turns a validated [`CommandRequest`] into the exact argv the tool expects:
//! verb first, directory flags next, then selection and option flags, and the
//! target flag last. Each selection token is its own element so nothing is
//! ever re-split by a shell.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::request::{CommandRequest, Verb};

/// Resolved locations of the tool's configuration directories
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbtPaths {
    /// Directory containing profiles.yml
    pub profiles_dir: PathBuf,
    /// Directory containing dbt_project.yml
    pub project_dir: PathBuf,
}

impl DbtPaths {
    pub fn new(profiles_dir: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            profiles_dir: profiles_dir.into(),
            project_dir: project_dir.into(),
        }
    }

    pub fn profiles_file(&self) -> PathBuf {
        self.profiles_dir.join("profiles.yml")
    }

    pub fn project_file(&self) -> PathBuf {
        self.project_dir.join("dbt_project.yml")
    }

    /// Selector definitions live beside dbt_project.yml
    pub fn selectors_file(&self) -> PathBuf {
        self.project_dir.join("selectors.yml")
    }
}

/// Ordered, immutable argument list for one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InvocationArgs(Vec<String>);

impl InvocationArgs {
    /// Wrap an already-tokenized command (used for raw commands)
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        Self(tokens)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }

    /// The subcommand, i.e. the first element
    pub fn subcommand(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Space-joined form used in response metadata and logs
    pub fn command_line(&self) -> String {
        self.0.join(" ")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for InvocationArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Build the argument list for a validated request
pub fn build_args(request: &CommandRequest, paths: &DbtPaths) -> InvocationArgs {
    let mut args = vec![request.verb.as_str().to_string()];

    args.push("--project-dir".to_string());
    args.push(path_arg(&paths.project_dir));
    args.push("--profiles-dir".to_string());
    args.push(path_arg(&paths.profiles_dir));

    if request.verb == Verb::List {
        args.push("--output".to_string());
        args.push("json".to_string());
        if let Some(resource_type) = &request.resource_type {
            args.push("--resource-type".to_string());
            args.push(resource_type.to_string());
        }
    }

    if !request.select.is_empty() {
        args.push("--select".to_string());
        args.extend(request.select.iter().cloned());
    }
    if !request.exclude.is_empty() {
        args.push("--exclude".to_string());
        args.extend(request.exclude.iter().cloned());
    }
    if let Some(selector) = &request.selector {
        args.push("--selector".to_string());
        args.push(selector.clone());
    }

    let options = &request.options;
    if options.full_refresh {
        args.push("--full-refresh".to_string());
    }
    if options.fail_fast {
        args.push("--fail-fast".to_string());
    }
    if options.store_failures {
        args.push("--store-failures".to_string());
    }

    args.push("--target".to_string());
    args.push(request.target.clone());

    InvocationArgs(args)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
