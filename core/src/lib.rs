//! dbtserve core
//!
//! Command-result normalization and error translation for the dbt CLI:
//! building invocation arguments, classifying raw results, normalizing
//! nodes and test outcomes, and mapping tool failures onto a small error
//! taxonomy. Nothing here performs I/O.

pub mod args;
pub mod classify;
pub mod errors;
pub mod node;
pub mod normalize;
pub mod patterns;
pub mod raw;
pub mod request;
pub mod translate;
pub mod unsafe_cmd;

pub use args::{build_args, DbtPaths, InvocationArgs};
pub use classify::{classify, InvocationContext};
pub use errors::{ConfigType, DbtError, ErrorKind, FailedNode, ValidationIssue};
pub use node::{Node, ResourceType, TestResult, TestStatus, TestSummary};
pub use normalize::{normalize, Normalized};
pub use raw::{FailureKind, NodeDescriptor, RawPayload, RawResult, RunOutcome, ToolFailure};
pub use request::{CommandOptions, CommandRequest, Verb};
pub use translate::translate;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, DbtError>;
