//! dbtserve tools
//!
//! Adapters that actually run dbt: the [`DbtInvoker`] seam, the subprocess
//! implementation, artifact readers, and a scripted invoker for tests.

pub mod artifacts;
pub mod invoker;
pub mod process;
pub mod scripted;

pub use invoker::{DbtInvoker, InvokeError};
pub use process::ProcessInvoker;
pub use scripted::ScriptedInvoker;
