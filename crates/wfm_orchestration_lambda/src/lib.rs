//! AWS-oriented adapters and handlers for workflow manager routing and
//! migration orchestration.
//!
//! This crate owns runtime integration details (Lambda handlers, function
//! invocation, state machine polling and environment configuration) and
//! delegates routing and run semantics to `wfm_orchestration_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod observability;
