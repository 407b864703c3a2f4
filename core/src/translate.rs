//! Exception translator
//!
//! Maps a structured tool failure onto the client-facing taxonomy. The most
//! specific rule wins; every result keeps the failure as its source.

use crate::classify::InvocationContext;
use crate::errors::{ConfigType, DbtError};
use crate::patterns;
use crate::raw::{FailureKind, ToolFailure};

pub fn translate(failure: &ToolFailure, ctx: &InvocationContext) -> DbtError {
    let detail = failure.message.trim();

    let error = match failure.kind {
        FailureKind::Parsing => DbtError::configuration(
            format!("Configuration parsing error: {}", detail),
            ConfigType::Parsing,
            None,
        ),
        FailureKind::Project => DbtError::configuration(
            format!("dbt project configuration error: {}", detail),
            ConfigType::ProjectFile,
            Some(ctx.paths.project_dir.display().to_string()),
        ),
        FailureKind::Profile | FailureKind::Runtime if patterns::is_target_not_found(detail) => {
            DbtError::target(ctx.target_or_unknown(), patterns::valid_targets(detail))
        }
        FailureKind::Profile => DbtError::configuration(
            format!("dbt profile configuration error: {}", detail),
            ConfigType::ProfileFile,
            Some(ctx.paths.profiles_dir.display().to_string()),
        ),
        FailureKind::Runtime => DbtError::execution(ctx.args.to_vec()),
        FailureKind::Io | FailureKind::Unknown => DbtError::internal("Unexpected dbt error"),
    };

    error.with_source(Some(failure.clone()))
}
