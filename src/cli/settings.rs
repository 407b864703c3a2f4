//! Layered service settings
//!
//! Lowest to highest precedence: built-in defaults, `dbtserve.toml`,
//! `DBTSERVE_*` variables, dbt's own `DBT_PROFILES_DIR` / `DBT_PROJECT_DIR`,
//! command-line flags.

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::cli::args::{Args, LogFormat};
use crate::cli::Result;

pub const DEFAULT_CONFIG_FILE: &str = "dbtserve.toml";
pub const ENV_PREFIX: &str = "DBTSERVE";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub dbt_executable: String,
    pub default_target: String,
    #[serde(default)]
    pub profiles_dir: Option<PathBuf>,
    #[serde(default)]
    pub project_dir: Option<PathBuf>,
    pub search_root: PathBuf,
    pub log_format: LogFormat,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    /// Load settings using the process environment
    pub fn load(args: &Args) -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_from(args, &env)
    }

    /// Load settings against an explicit environment
    pub fn load_from(args: &Args, env: &HashMap<String, String>) -> Result<Self> {
        let config_file = args
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let settings = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8000_i64)?
            .set_default("dbt_executable", "dbt")?
            .set_default("default_target", "dev")?
            .set_default("search_root", ".")?
            .set_default("log_format", LogFormat::Pretty.as_str())?
            .add_source(
                File::from(config_file.as_path())
                    .format(FileFormat::Toml)
                    .required(args.config.is_some()),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .source(Some(env.clone()))
                    .try_parsing(true),
            )
            .set_override_option("profiles_dir", non_empty(env, "DBT_PROFILES_DIR"))?
            .set_override_option("project_dir", non_empty(env, "DBT_PROJECT_DIR"))?
            .set_override_option("host", args.host.clone())?
            .set_override_option("port", args.port.map(i64::from))?
            .set_override_option("dbt_executable", args.dbt_executable.clone())?
            .set_override_option("default_target", args.default_target.clone())?
            .set_override_option("profiles_dir", args.profiles_dir.as_deref().map(path_value))?
            .set_override_option("project_dir", args.project_dir.as_deref().map(path_value))?
            .set_override_option("search_root", args.search_root.as_deref().map(path_value))?
            .set_override_option("log_format", args.log_format.map(|f| f.as_str()))?
            .set_override_option("log_dir", args.log_dir.as_deref().map(path_value))?
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

fn non_empty(env: &HashMap<String, String>, key: &str) -> Option<String> {
    env.get(key).filter(|value| !value.trim().is_empty()).cloned()
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args_with_config(dir: &TempDir) -> Args {
        Args {
            config: Some(dir.path().join("dbtserve.toml")),
            ..Args::default()
        }
    }

    #[test]
    fn test_defaults() {
        let args = Args {
            config: Some(PathBuf::from("/nonexistent/dbtserve-defaults.toml")),
            ..Args::default()
        };
        // an explicit config file must exist
        assert!(Settings::load_from(&args, &HashMap::new()).is_err());

        let settings = Settings::load_from(&Args::default(), &HashMap::new()).unwrap();
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.dbt_executable, "dbt");
        assert_eq!(settings.default_target, "dev");
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert!(settings.profiles_dir.is_none());
    }

    #[test]
    fn test_precedence() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("dbtserve.toml"),
            "port = 7000\ndefault_target = \"ci\"\nprofiles_dir = \"/from/file\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(&args_with_config(&dir), &HashMap::new()).unwrap();
        assert_eq!(settings.port, 7000);
        assert_eq!(settings.default_target, "ci");

        let env = HashMap::from([
            ("DBTSERVE_PORT".to_string(), "7100".to_string()),
            ("DBT_PROFILES_DIR".to_string(), "/from/dbt/env".to_string()),
        ]);
        let settings = Settings::load_from(&args_with_config(&dir), &env).unwrap();
        assert_eq!(settings.port, 7100);
        assert_eq!(settings.profiles_dir, Some(PathBuf::from("/from/dbt/env")));

        let args = Args {
            port: Some(7200),
            profiles_dir: Some(PathBuf::from("/from/flag")),
            log_format: Some(LogFormat::Json),
            ..args_with_config(&dir)
        };
        let settings = Settings::load_from(&args, &env).unwrap();
        assert_eq!(settings.port, 7200);
        assert_eq!(settings.profiles_dir, Some(PathBuf::from("/from/flag")));
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn test_blank_dbt_env_ignored() {
        let env = HashMap::from([("DBT_PROJECT_DIR".to_string(), "  ".to_string())]);
        let settings = Settings::load_from(&Args::default(), &env).unwrap();
        assert!(settings.project_dir.is_none());
    }
}
