//! dbtserve: an HTTP service in front of the dbt CLI
//!
//! The binary wires the pieces together; request handling lives in
//! `dbtserve-api`, process invocation in `dbtserve-tools`, and result
//! normalization and error translation in `dbtserve-core`.

pub mod cli;
