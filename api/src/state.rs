//! Shared server state
//!
//! Configuration is resolved once at startup, possibly after the listener is
//! already accepting connections. Until it is published, command endpoints
//! answer 503.

use arc_swap::ArcSwap;
use serde::Serialize;
use std::sync::Arc;

use dbtserve_core::DbtPaths;
use dbtserve_tools::DbtInvoker;

use crate::error::ApiError;

/// Immutable per-process configuration handed to every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceConfig {
    pub paths: DbtPaths,
    /// Target used when a request names none
    pub default_target: String,
}

impl ServiceConfig {
    pub fn new(paths: DbtPaths, default_target: impl Into<String>) -> Self {
        Self {
            paths,
            default_target: default_target.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ReadinessState {
    Pending,
    Ready(Arc<ServiceConfig>),
    Failed(String),
}

pub struct ApiState {
    pub invoker: Arc<dyn DbtInvoker>,
    readiness: ArcSwap<ReadinessState>,
}

impl ApiState {
    /// State that is not ready until [`ApiState::mark_ready`] is called
    pub fn new(invoker: Arc<dyn DbtInvoker>) -> Self {
        Self {
            invoker,
            readiness: ArcSwap::from_pointee(ReadinessState::Pending),
        }
    }

    /// State that is ready immediately
    pub fn ready(invoker: Arc<dyn DbtInvoker>, config: ServiceConfig) -> Self {
        let state = Self::new(invoker);
        state.mark_ready(config);
        state
    }

    pub fn mark_ready(&self, config: ServiceConfig) {
        self.readiness
            .store(Arc::new(ReadinessState::Ready(Arc::new(config))));
    }

    pub fn mark_failed(&self, detail: impl Into<String>) {
        self.readiness
            .store(Arc::new(ReadinessState::Failed(detail.into())));
    }

    pub fn readiness(&self) -> Arc<ReadinessState> {
        self.readiness.load_full()
    }

    /// The published configuration, or 503 when there is none yet
    pub fn config(&self) -> Result<Arc<ServiceConfig>, ApiError> {
        match &**self.readiness.load() {
            ReadinessState::Ready(config) => Ok(config.clone()),
            ReadinessState::Pending => Err(ApiError::NotReady(
                "Configuration is still being resolved".to_string(),
            )),
            ReadinessState::Failed(detail) => Err(ApiError::NotReady(detail.clone())),
        }
    }
}

impl std::fmt::Debug for ApiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiState")
            .field("readiness", &self.readiness())
            .finish_non_exhaustive()
    }
}
