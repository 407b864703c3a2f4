//! Error-to-response mapping
//!
//! The only place HTTP statuses are assigned to domain errors. Bodies are
//! always `{error, message, ...details, suggestion?}`; 5xx bodies never carry
//! tool output.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use std::any::Any;
use std::error::Error as _;
use tracing::{error, warn};

use dbtserve_core::{DbtError, ValidationIssue};
use dbtserve_tools::InvokeError;

const INTERNAL_MESSAGE: &str = "An unexpected error occurred while running dbt";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Dbt(#[from] DbtError),

    #[error("service not ready: {0}")]
    NotReady(String),
}

impl From<InvokeError> for ApiError {
    fn from(err: InvokeError) -> Self {
        ApiError::Dbt(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Dbt(DbtError::validation(vec![ValidationIssue::new(
            "body",
            rejection.body_text(),
        )]))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Dbt(
                DbtError::Validation { .. }
                | DbtError::Target { .. }
                | DbtError::Configuration { .. }
                | DbtError::Compilation { .. },
            ) => StatusCode::BAD_REQUEST,
            ApiError::Dbt(DbtError::Execution { .. } | DbtError::Internal { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// JSON body sent to the client
    pub fn body(&self) -> Value {
        let err = match self {
            ApiError::NotReady(detail) => {
                return json!({
                    "error": "ServiceUnavailable",
                    "message": "Service is not ready to accept dbt commands",
                    "detail": detail,
                });
            }
            ApiError::Dbt(err) => err,
        };

        let mut body = Map::new();
        body.insert("error".into(), json!(err.kind().name()));

        match err {
            DbtError::Validation { field, issues, .. } => {
                body.insert("message".into(), json!(err.to_string()));
                if let Some(field) = field {
                    body.insert("field".into(), json!(field));
                }
                body.insert("issues".into(), json!(issues));
            }
            DbtError::Target {
                provided_target,
                valid_targets,
                ..
            } => {
                body.insert("message".into(), json!(err.to_string()));
                body.insert("field".into(), json!("target"));
                body.insert("provided_target".into(), json!(provided_target));
                body.insert("valid_targets".into(), json!(valid_targets));
            }
            DbtError::Configuration {
                config_type,
                config_path,
                search_paths,
                found_paths,
                ..
            } => {
                body.insert("message".into(), json!(err.to_string()));
                body.insert("config_type".into(), json!(config_type));
                if let Some(path) = config_path {
                    body.insert("config_path".into(), json!(path));
                }
                if !search_paths.is_empty() {
                    body.insert("search_paths".into(), json!(search_paths));
                }
                if !found_paths.is_empty() {
                    body.insert("found_paths".into(), json!(found_paths));
                }
            }
            DbtError::Compilation { failed_nodes, .. } => {
                body.insert("message".into(), json!(err.to_string()));
                body.insert("failed_models".into(), json!(failed_nodes));
            }
            DbtError::Execution { command, .. } => {
                body.insert("message".into(), json!(err.to_string()));
                body.insert("command".into(), json!(command));
            }
            DbtError::Internal { .. } => {
                body.insert("message".into(), json!(INTERNAL_MESSAGE));
            }
        }

        if let Some(suggestion) = err.suggestion() {
            body.insert("suggestion".into(), json!(suggestion));
        }
        Value::Object(body)
    }

    fn log(&self, status: StatusCode) {
        let cause = self.source().map(|source| source.to_string());

        match self {
            ApiError::NotReady(detail) => {
                warn!(status = status.as_u16(), detail = %detail, "Rejected request before readiness")
            }
            ApiError::Dbt(err) if status.is_server_error() => error!(
                status = status.as_u16(),
                kind = %err.kind(),
                error = %err,
                cause = ?cause,
                "dbt command failed"
            ),
            ApiError::Dbt(err) => warn!(
                status = status.as_u16(),
                kind = %err.kind(),
                error = %err,
                cause = ?cause,
                "dbt command rejected"
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        self.log(status);
        (status, Json(self.body())).into_response()
    }
}

/// Response for a handler that panicked; same body as any internal error
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    error!(panic = %detail, "Request handler panicked");

    ApiError::Dbt(DbtError::internal("Request handler panicked")).into_response()
}
