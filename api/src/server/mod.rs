//! API Server Module
//!
//! Router construction and the serving loop.

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::info;

use crate::error::panic_response;
use crate::handlers::{
    build_command, compile_command, health_check, list_command, readiness_check, root,
    run_command, test_command, unsafe_command,
};
use crate::models::ApiConfig;
use crate::state::ApiState;

/// Build the application router around shared state
pub fn router(state: Arc<ApiState>) -> Router {
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/readiness", get(readiness_check))
        .route("/dbt/run", post(run_command))
        .route("/dbt/test", post(test_command))
        .route("/dbt/build", post(build_command))
        .route("/dbt/list", post(list_command))
        .route("/dbt/compile", post(compile_command))
        .route("/dbt/unsafe", post(unsafe_command))
        .with_state(state);
    with_middleware(app)
}

/// Panics become a 500 JSON body; every request gets a trace span
pub fn with_middleware(app: Router) -> Router {
    app.layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

/// Main API server
pub struct ApiServer {
    config: ApiConfig,
    state: Arc<ApiState>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, state: Arc<ApiState>) -> Self {
        Self { config, state }
    }

    pub fn state(&self) -> Arc<ApiState> {
        self.state.clone()
    }

    /// Serve until ctrl-c
    pub async fn start(&self) -> Result<()> {
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        info!(
            "dbtserve {} listening on {}",
            self.config.version,
            listener.local_addr()?
        );

        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start API server: {}", e))?;

        info!("dbtserve stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
