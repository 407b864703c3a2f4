//! CLI module: startup wiring for the dbt service
//!
//! Provides:
//! - Argument parsing
//! - Layered settings (defaults, config file, environment, flags)
//! - dbt profiles/project directory discovery

pub mod args;
pub mod discovery;
pub mod settings;

pub use args::{parse_args, Args, LogFormat};
pub use discovery::{resolve_paths, verify_paths};
pub use settings::Settings;

use dbtserve_core::DbtError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Dbt(#[from] DbtError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, Error>;
