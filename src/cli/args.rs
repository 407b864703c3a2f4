//! CLI argument parsing
//!
//! Flags sit at the top of the configuration stack: anything given here
//! overrides the config file and the environment.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        }
    }
}

/// Parsed command-line arguments
#[derive(Debug, Clone, Default, PartialEq, Parser)]
#[command(name = "dbtserve", version, about = "Serve dbt commands over HTTP")]
pub struct Args {
    /// Configuration file (TOML); must exist when given
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Directory containing profiles.yml
    #[arg(long, value_name = "DIR")]
    pub profiles_dir: Option<PathBuf>,

    /// Directory containing dbt_project.yml
    #[arg(long, value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// Target used when a request names none
    #[arg(long)]
    pub default_target: Option<String>,

    /// dbt executable to invoke
    #[arg(long, value_name = "PATH")]
    pub dbt_executable: Option<String>,

    /// Root of the filesystem walk used to discover dbt files
    #[arg(long, value_name = "DIR")]
    pub search_root: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Also write daily-rotated logs to this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

/// Parse CLI arguments from an explicit argument list
pub fn parse_args<I, T>(args: I) -> crate::cli::Result<Args>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Args::try_parse_from(args).map_err(|e| crate::cli::Error::InvalidArgs(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags() {
        let args = parse_args(["dbtserve"]).unwrap();
        assert_eq!(args, Args::default());
    }

    #[test]
    fn test_flags() {
        let args = parse_args([
            "dbtserve",
            "--port",
            "9000",
            "--profiles-dir",
            "/srv/profiles",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(args.port, Some(9000));
        assert_eq!(args.profiles_dir, Some(PathBuf::from("/srv/profiles")));
        assert_eq!(args.log_format, Some(LogFormat::Json));
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(parse_args(["dbtserve", "--port", "not-a-port"]).is_err());
    }
}
