//! Readers for the files dbt leaves in its target directory
//!
//! `run_results.json` carries one entry per executed node; `manifest.json`
//! carries the node descriptors. Only the fields the service uses are
//! decoded; everything else in these (large) files is ignored.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use dbtserve_core::{NodeDescriptor, RunOutcome};

use crate::invoker::InvokeError;

pub const RUN_RESULTS_FILE: &str = "run_results.json";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Deserialize)]
struct RunResultsFile {
    #[serde(default)]
    results: Vec<RunResultEntry>,
}

#[derive(Debug, Deserialize)]
struct RunResultEntry {
    unique_id: String,
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    failures: Option<u64>,
    #[serde(default)]
    execution_time: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    nodes: HashMap<String, ManifestNode>,
}

#[derive(Debug, Deserialize)]
struct ManifestNode {
    name: String,
    resource_type: String,
    #[serde(default)]
    fqn: Vec<String>,
    #[serde(default)]
    depends_on: ManifestDependsOn,
    #[serde(default)]
    original_file_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestDependsOn {
    #[serde(default)]
    nodes: Vec<String>,
}

/// Execution outcomes from a target directory
///
/// Returns `Ok(None)` when the invocation wrote no run results.
pub fn load_outcomes(target_dir: &Path) -> Result<Option<Vec<RunOutcome>>, InvokeError> {
    let run_results_path = target_dir.join(RUN_RESULTS_FILE);
    if !run_results_path.is_file() {
        debug!(path = %run_results_path.display(), "No run results written");
        return Ok(None);
    }

    let run_results: RunResultsFile = read_json(&run_results_path)?;
    let manifest_path = target_dir.join(MANIFEST_FILE);
    let manifest: ManifestFile = if manifest_path.is_file() {
        read_json(&manifest_path)?
    } else {
        warn!(path = %manifest_path.display(), "Manifest missing, deriving descriptors from ids");
        ManifestFile::default()
    };

    let outcomes = run_results
        .results
        .into_iter()
        .map(|entry| {
            let node = match manifest.nodes.get(&entry.unique_id) {
                Some(node) => NodeDescriptor {
                    unique_id: entry.unique_id.clone(),
                    name: node.name.clone(),
                    resource_type: node.resource_type.clone(),
                    fqn: node.fqn.clone(),
                    depends_on: node.depends_on.nodes.clone(),
                    original_file_path: node.original_file_path.clone(),
                },
                None => descriptor_from_id(&entry.unique_id),
            };
            RunOutcome {
                node,
                status: entry.status,
                message: entry.message,
                failures: entry.failures,
                execution_time: entry.execution_time,
            }
        })
        .collect();

    Ok(Some(outcomes))
}

/// Best-effort descriptor for an id of the form `<type>.<package>.<name>[.<hash>]`
pub fn descriptor_from_id(unique_id: &str) -> NodeDescriptor {
    let segments: Vec<&str> = unique_id.split('.').collect();
    let resource_type = segments.first().copied().unwrap_or_default().to_string();
    let name = segments
        .get(2)
        .or_else(|| segments.last())
        .copied()
        .unwrap_or_default()
        .to_string();
    let fqn = match segments.get(1) {
        Some(package) if segments.len() > 2 => vec![package.to_string(), name.clone()],
        _ => Vec::new(),
    };

    NodeDescriptor {
        unique_id: unique_id.to_string(),
        name,
        resource_type,
        fqn,
        depends_on: Vec::new(),
        original_file_path: None,
    }
}

/// Lines of `list --output json` stdout that hold a JSON record
pub fn list_records(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .map(str::to_string)
        .collect()
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, InvokeError> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| InvokeError::Artifact {
        path: path.to_path_buf(),
        source,
    })
}
