//! dbtserve API Module
//!
//! HTTP surface for running dbt commands: routes, wire models, readiness
//! state and the mapping from domain errors to responses.

pub mod error;
pub mod handlers;
pub mod models;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use models::ApiConfig;
pub use server::{router, with_middleware, ApiServer};
pub use state::{ApiState, ReadinessState, ServiceConfig};
