//! API Handlers Module
//!
//! Every structured command endpoint follows the same pipeline: validate,
//! build arguments, invoke, classify, normalize. Only the verb differs.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use dbtserve_core::{
    build_args, classify, normalize, unsafe_cmd, CommandRequest, ConfigType, DbtError, DbtPaths,
    InvocationContext, Verb,
};

use crate::error::ApiError;
use crate::models::{
    CommandBody, CommandResponse, HealthResponse, ReadinessResponse, ResponseMetadata,
    ServiceInfo, StrictFailureResponse, UnsafeCommandBody, UnsafeMetadata, UnsafeResponse,
};
use crate::state::{ApiState, ReadinessState};

type CommandPayload = Result<Json<CommandBody>, JsonRejection>;

pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "dbtserve",
        version: env!("CARGO_PKG_VERSION").to_string(),
        docs: "POST /dbt/{run,test,build,list,compile,unsafe}",
    })
}

/// Liveness; answers as soon as the process is serving
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "dbtserve",
    })
}

/// Ready once configuration is resolved and both dbt files are present
pub async fn readiness_check(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    let config = match &*state.readiness() {
        ReadinessState::Ready(config) => config.clone(),
        ReadinessState::Pending => {
            return Err(ApiError::NotReady(
                "Configuration is still being resolved".to_string(),
            ))
        }
        ReadinessState::Failed(detail) => return Err(ApiError::NotReady(detail.clone())),
    };

    for file in [config.paths.profiles_file(), config.paths.project_file()] {
        if !file.is_file() {
            return Err(ApiError::NotReady(format!(
                "Required file {} is missing",
                file.display()
            )));
        }
    }

    Ok(Json(ReadinessResponse {
        status: "ready",
        profiles_dir: config.paths.profiles_dir.display().to_string(),
        project_dir: config.paths.project_dir.display().to_string(),
    })
    .into_response())
}

pub async fn run_command(
    State(state): State<Arc<ApiState>>,
    body: CommandPayload,
) -> Result<Response, ApiError> {
    execute_command(&state, Verb::Run, body).await
}

pub async fn test_command(
    State(state): State<Arc<ApiState>>,
    body: CommandPayload,
) -> Result<Response, ApiError> {
    execute_command(&state, Verb::Test, body).await
}

pub async fn build_command(
    State(state): State<Arc<ApiState>>,
    body: CommandPayload,
) -> Result<Response, ApiError> {
    execute_command(&state, Verb::Build, body).await
}

pub async fn list_command(
    State(state): State<Arc<ApiState>>,
    body: CommandPayload,
) -> Result<Response, ApiError> {
    execute_command(&state, Verb::List, body).await
}

pub async fn compile_command(
    State(state): State<Arc<ApiState>>,
    body: CommandPayload,
) -> Result<Response, ApiError> {
    execute_command(&state, Verb::Compile, body).await
}

async fn execute_command(
    state: &ApiState,
    verb: Verb,
    body: CommandPayload,
) -> Result<Response, ApiError> {
    let config = state.config()?;
    let Json(body) = body?;

    let request = body.into_request(verb, &config.default_target);
    request.validate()?;
    require_selectors(&request, &config.paths)?;

    let args = build_args(&request, &config.paths);
    let ctx = InvocationContext::new(verb, request.target.clone(), args.clone(), config.paths.clone());
    let invocation_id = Uuid::new_v4();
    info!(%invocation_id, verb = %verb, target = %request.target, "Running dbt command");

    let started_at = Utc::now();
    let raw = state.invoker.invoke(verb, &args, &config.paths).await?;
    let finished_at = Utc::now();

    classify(&ctx, &raw)?;
    let normalized = normalize(verb, &raw)?;

    let summary = normalized.test_summary;
    let metadata = ResponseMetadata {
        command: verb,
        dbt_command: args.command_line(),
        target: request.target.clone(),
        nodes_processed: normalized.nodes.len(),
        selection_criteria: request.selection_criteria(),
        invocation_id,
        started_at,
        finished_at,
        skipped_records: normalized.skipped_records,
        has_test_failures: summary.map(|s| s.has_failures()),
        has_test_errors: summary.map(|s| s.has_errors()),
    };

    debug!(
        %invocation_id,
        nodes = normalized.nodes.len(),
        summary = ?summary,
        "dbt command completed"
    );

    if let Some(summary) = summary {
        if request.options.strict && (summary.has_failures() || summary.has_errors()) {
            let body = StrictFailureResponse::new(&normalized.nodes, summary, metadata);
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response());
        }
    }

    Ok(Json(CommandResponse {
        success: true,
        nodes: normalized.nodes,
        metadata,
        test_summary: summary,
    })
    .into_response())
}

/// A named selector needs selectors.yml next to the project file
fn require_selectors(request: &CommandRequest, paths: &DbtPaths) -> Result<(), DbtError> {
    if request.selector.is_none() || paths.selectors_file().is_file() {
        return Ok(());
    }
    Err(DbtError::config_missing(
        ConfigType::SelectorsFile,
        vec![paths.project_dir.display().to_string()],
    ))
}

/// Run a raw dbt command line after sanitization
pub async fn unsafe_command(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<UnsafeCommandBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let config = state.config()?;
    let Json(body) = body?;

    let args = unsafe_cmd::sanitize(&body.unsafe_dbt_cli_command)?;
    let ctx = InvocationContext::for_raw_command(args.clone(), config.paths.clone());
    let invocation_id = Uuid::new_v4();
    info!(%invocation_id, command = %args, "Running raw dbt command");

    let started_at = Utc::now();
    let raw = state
        .invoker
        .invoke(Verb::Unsafe, &args, &config.paths)
        .await?;
    let finished_at = Utc::now();

    classify(&ctx, &raw)?;
    let normalized = normalize(Verb::Unsafe, &raw)?;

    Ok(Json(UnsafeResponse {
        success: true,
        status: "success",
        output: raw.output,
        nodes: normalized.nodes,
        metadata: UnsafeMetadata {
            dbt_command: format!("dbt {}", args),
            invocation_id,
            started_at,
            finished_at,
        },
    })
    .into_response())
}
