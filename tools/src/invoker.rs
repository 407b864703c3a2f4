//! Invocation seam between the service and the dbt executable

use async_trait::async_trait;
use std::path::PathBuf;

use dbtserve_core::{DbtError, DbtPaths, FailureKind, InvocationArgs, RawResult, ToolFailure, Verb};

/// Failure to run the tool at all, as opposed to the tool reporting failure
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unreadable artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invocation task failed: {0}")]
    Join(String),
}

impl From<InvokeError> for DbtError {
    fn from(err: InvokeError) -> Self {
        DbtError::internal("Failed to invoke dbt")
            .with_source(Some(ToolFailure::new(FailureKind::Io, err.to_string())))
    }
}

/// Runs one dbt invocation and reports its raw outcome
///
/// `verb` tells the implementation which payload shape to collect; `args`
/// start with the subcommand (no program name).
#[async_trait]
pub trait DbtInvoker: Send + Sync {
    async fn invoke(
        &self,
        verb: Verb,
        args: &InvocationArgs,
        paths: &DbtPaths,
    ) -> Result<RawResult, InvokeError>;
}
