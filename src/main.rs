//! dbtserve binary
//!
//! Startup order: flags, settings, logging, then the HTTP server. dbt
//! directory discovery runs in the background; until it completes the
//! `/dbt/*` endpoints answer 503.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dbtserve::cli::{resolve_paths, Args, LogFormat, Settings};
use dbtserve_api::{ApiConfig, ApiServer, ApiState, ServiceConfig};
use dbtserve_tools::ProcessInvoker;

const DEFAULT_LOG_FILTER: &str = "info,dbtserve=debug,dbtserve_api=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::load(&args).context("failed to load settings")?;
    let _guard = init_tracing(&settings)?;

    info!(
        host = %settings.host,
        port = settings.port,
        dbt = %settings.dbt_executable,
        "Starting dbtserve"
    );

    let invoker = ProcessInvoker::new(settings.dbt_executable.clone());
    let state = Arc::new(ApiState::new(Arc::new(invoker)));

    let readiness = state.clone();
    let discovery_settings = settings.clone();
    tokio::spawn(async move {
        let resolved = tokio::task::spawn_blocking(move || {
            let cwd = std::env::current_dir()?;
            resolve_paths(&discovery_settings, &cwd)
                .map(|paths| (paths, discovery_settings.default_target))
                .map_err(dbtserve::cli::Error::from)
        })
        .await;

        match resolved {
            Ok(Ok((paths, default_target))) => {
                readiness.mark_ready(ServiceConfig::new(paths, default_target));
                info!("dbt configuration resolved, service ready");
            }
            Ok(Err(e)) => {
                error!(error = %e, "dbt configuration could not be resolved");
                readiness.mark_failed(e.to_string());
            }
            Err(e) => {
                error!(error = %e, "dbt discovery task failed");
                readiness.mark_failed(e.to_string());
            }
        }
    });

    let config = ApiConfig {
        host: settings.host.clone(),
        port: settings.port,
        ..ApiConfig::default()
    };
    ApiServer::new(config, state).start().await
}

fn init_tracing(settings: &Settings) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let (file_layer, guard) = match &settings.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "dbtserve.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    match settings.log_format {
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }

    Ok(guard)
}
