//! Workflow manager event routing and backup-gated migration primitives.
//!
//! This crate owns deterministic routing and orchestration behavior: event
//! envelopes, rule matching, dispatch, the backup/migration execution graph
//! and its run state machine. It intentionally excludes AWS SDK and Lambda
//! runtime concerns; those live in `wfm_orchestration_lambda`.

pub mod dispatch;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod graph;
pub mod pattern;
pub mod polling;
pub mod registry;
pub mod run;
pub mod runner;
pub mod trigger;
