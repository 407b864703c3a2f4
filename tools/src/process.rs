//! Subprocess invoker
//!
//! Runs the dbt executable with an explicit argv (no shell) on tokio's
//! blocking pool. Each invocation writes its artifacts into a private
//! temporary directory so concurrent requests never read each other's
//! results.
//!
//! Exit status contract:
//! - 0: success
//! - 1: the tool ran but some nodes errored or tests failed
//! - anything else: the tool could not complete; the printed text is
//!   classified into a [`ToolFailure`]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use dbtserve_core::{patterns, DbtPaths, InvocationArgs, RawPayload, RawResult, ToolFailure, Verb};

use crate::artifacts;
use crate::invoker::{DbtInvoker, InvokeError};

/// Environment variable dbt reads for its target (artifact) directory
pub const TARGET_PATH_ENV: &str = "DBT_TARGET_PATH";

/// Invokes a dbt executable as a child process
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    executable: PathBuf,
}

impl ProcessInvoker {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl Default for ProcessInvoker {
    fn default() -> Self {
        Self::new("dbt")
    }
}

#[async_trait]
impl DbtInvoker for ProcessInvoker {
    async fn invoke(
        &self,
        verb: Verb,
        args: &InvocationArgs,
        paths: &DbtPaths,
    ) -> Result<RawResult, InvokeError> {
        let executable = self.executable.clone();
        let args = args.clone();
        let paths = paths.clone();

        tokio::task::spawn_blocking(move || run_blocking(&executable, verb, &args, &paths))
            .await
            .map_err(|e| InvokeError::Join(e.to_string()))?
    }
}

fn run_blocking(
    executable: &Path,
    verb: Verb,
    args: &InvocationArgs,
    paths: &DbtPaths,
) -> Result<RawResult, InvokeError> {
    let target_dir = TempDir::new()?;
    let start = Instant::now();

    info!(command = %args, "Invoking dbt");

    let output = Command::new(executable)
        .args(args.as_slice())
        .current_dir(&paths.project_dir)
        .env(TARGET_PATH_ENV, target_dir.path())
        .env("DBT_PROFILES_DIR", &paths.profiles_dir)
        .output()
        .map_err(|source| InvokeError::Spawn {
            program: executable.to_path_buf(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let exit_code = output.status.code();

    debug!(
        exit_code = ?exit_code,
        duration_ms = start.elapsed().as_millis() as u64,
        stdout_bytes = stdout.len(),
        stderr_bytes = stderr.len(),
        "dbt exited"
    );

    let text = if stderr.trim().is_empty() {
        stdout.clone()
    } else {
        format!("{}\n{}", stdout, stderr)
    };

    let result = match exit_code {
        Some(0) => RawResult {
            success: true,
            exception: None,
            payload: collect_payload(verb, &stdout, target_dir.path())?,
            output: text,
        },
        Some(1) => RawResult {
            success: false,
            exception: None,
            payload: collect_payload(verb, &stdout, target_dir.path())?,
            output: text,
        },
        _ => {
            let kind = patterns::failure_kind(&text);
            warn!(exit_code = ?exit_code, kind = %kind, "dbt did not complete");
            RawResult::failed(Some(ToolFailure::new(kind, text.trim())), None).with_output(text)
        }
    };

    Ok(result)
}

fn collect_payload(
    verb: Verb,
    stdout: &str,
    target_dir: &Path,
) -> Result<Option<RawPayload>, InvokeError> {
    if verb == Verb::List {
        return Ok(Some(RawPayload::FlatList(artifacts::list_records(stdout))));
    }
    Ok(artifacts::load_outcomes(target_dir)?.map(RawPayload::Execution))
}
