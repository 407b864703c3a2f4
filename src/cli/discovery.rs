//! dbt directory resolution
//!
//! Resolution priority for each of profiles.yml and dbt_project.yml:
//! 1. Explicit directory (flag, env or config file); must exist
//! 2. The working directory, then up to three of its parents
//! 3. A bounded walk from the search root, skipping tool and VCS directories
//!
//! The walk must find exactly one copy of the file.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use dbtserve_core::{ConfigType, DbtError, DbtPaths};

use crate::cli::settings::Settings;

const PARENT_LEVELS: usize = 3;
const MAX_WALK_DEPTH: usize = 8;

const EXCLUDED_DIRS: [&str; 12] = [
    ".git",
    ".venv",
    "venv",
    "env",
    "__pycache__",
    ".pytest_cache",
    "logs",
    "target",
    "node_modules",
    "dbt_packages",
    "dbt_internal_packages",
    ".tox",
];

/// Resolve both dbt directories and confirm their files exist
pub fn resolve_paths(settings: &Settings, cwd: &Path) -> Result<DbtPaths, DbtError> {
    let profiles_dir = resolve_dir(
        settings.profiles_dir.as_deref(),
        ConfigType::ProfileFile,
        cwd,
        &settings.search_root,
    )?;
    let project_dir = resolve_dir(
        settings.project_dir.as_deref(),
        ConfigType::ProjectFile,
        cwd,
        &settings.search_root,
    )?;

    let paths = DbtPaths::new(profiles_dir, project_dir);
    verify_paths(&paths)?;

    info!(
        profiles_dir = %paths.profiles_dir.display(),
        project_dir = %paths.project_dir.display(),
        "Resolved dbt configuration"
    );
    Ok(paths)
}

/// Both required files are present
pub fn verify_paths(paths: &DbtPaths) -> Result<(), DbtError> {
    let checks = [
        (ConfigType::ProfileFile, paths.profiles_file(), &paths.profiles_dir),
        (ConfigType::ProjectFile, paths.project_file(), &paths.project_dir),
    ];
    for (config_type, file, dir) in checks {
        if !file.is_file() {
            return Err(DbtError::config_missing(
                config_type,
                vec![dir.display().to_string()],
            ));
        }
    }
    Ok(())
}

fn resolve_dir(
    explicit: Option<&Path>,
    config_type: ConfigType,
    cwd: &Path,
    search_root: &Path,
) -> Result<PathBuf, DbtError> {
    let file_name = config_type.file_name().unwrap_or_default();

    if let Some(dir) = explicit {
        if !dir.is_dir() {
            return Err(DbtError::configuration(
                format!("Configured directory for {} does not exist or is not a directory", file_name),
                config_type,
                Some(dir.display().to_string()),
            ));
        }
        return Ok(dir.to_path_buf());
    }

    debug!(file = file_name, "No directory configured, discovering");
    discover(file_name, config_type, cwd, search_root)
}

/// Find the directory holding `file_name`
pub fn discover(
    file_name: &str,
    config_type: ConfigType,
    cwd: &Path,
    search_root: &Path,
) -> Result<PathBuf, DbtError> {
    for dir in cwd.ancestors().take(PARENT_LEVELS + 1) {
        if dir.join(file_name).is_file() {
            debug!(file = file_name, dir = %dir.display(), "Found near working directory");
            return Ok(dir.to_path_buf());
        }
    }

    let mut searched = Vec::new();
    let mut found = Vec::new();
    walk(search_root, file_name, 0, &mut searched, &mut found);

    match found.len() {
        0 => Err(DbtError::config_missing(
            config_type,
            searched.iter().map(|p| p.display().to_string()).collect(),
        )),
        1 => Ok(found.remove(0)),
        _ => Err(DbtError::config_duplicate(
            config_type,
            found.iter().map(|p| p.display().to_string()).collect(),
        )),
    }
}

fn walk(dir: &Path, file_name: &str, depth: usize, searched: &mut Vec<PathBuf>, found: &mut Vec<PathBuf>) {
    searched.push(dir.to_path_buf());
    if dir.join(file_name).is_file() {
        found.push(dir.to_path_buf());
    }
    if depth >= MAX_WALK_DEPTH {
        return;
    }

    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let mut children: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|entry| {
            let name = entry.file_name();
            !EXCLUDED_DIRS.iter().any(|excluded| name == *excluded)
        })
        .map(|entry| entry.path())
        .collect();
    children.sort();

    for child in children {
        walk(&child, file_name, depth + 1, searched, found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, file: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(file), "").unwrap();
    }

    #[test]
    fn test_found_in_parent_of_cwd() {
        let root = TempDir::new().unwrap();
        touch(root.path(), "dbt_project.yml");
        let cwd = root.path().join("models").join("staging");
        fs::create_dir_all(&cwd).unwrap();

        let dir = discover("dbt_project.yml", ConfigType::ProjectFile, &cwd, &cwd).unwrap();
        assert_eq!(dir, root.path());
    }

    #[test]
    fn test_walk_skips_excluded_dirs() {
        let root = TempDir::new().unwrap();
        let cwd = TempDir::new().unwrap();
        touch(&root.path().join("analytics"), "profiles.yml");
        touch(&root.path().join("dbt_packages").join("dbt_utils"), "profiles.yml");

        let dir = discover("profiles.yml", ConfigType::ProfileFile, cwd.path(), root.path()).unwrap();
        assert_eq!(dir, root.path().join("analytics"));
    }

    #[test]
    fn test_duplicates_rejected() {
        let root = TempDir::new().unwrap();
        let cwd = TempDir::new().unwrap();
        touch(&root.path().join("a"), "profiles.yml");
        touch(&root.path().join("b"), "profiles.yml");

        match discover("profiles.yml", ConfigType::ProfileFile, cwd.path(), root.path()) {
            Err(DbtError::Configuration { found_paths, .. }) => assert_eq!(found_paths.len(), 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_reports_search_paths() {
        let root = TempDir::new().unwrap();
        let cwd = TempDir::new().unwrap();

        match discover("profiles.yml", ConfigType::ProfileFile, cwd.path(), root.path()) {
            Err(DbtError::Configuration { search_paths, .. }) => {
                assert_eq!(search_paths, vec![root.path().display().to_string()])
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_explicit_dir_must_exist() {
        let err = resolve_dir(
            Some(Path::new("/nonexistent/dbtserve/12345")),
            ConfigType::ProfileFile,
            Path::new("."),
            Path::new("."),
        )
        .unwrap_err();
        assert_eq!(err.kind(), dbtserve_core::ErrorKind::Configuration);
    }

    #[test]
    fn test_verify_paths_requires_files() {
        let dir = TempDir::new().unwrap();
        let paths = DbtPaths::new(dir.path(), dir.path());
        assert!(verify_paths(&paths).is_err());

        touch(dir.path(), "profiles.yml");
        touch(dir.path(), "dbt_project.yml");
        assert!(verify_paths(&paths).is_ok());
    }
}
