//! Environment configuration for the three Lambda binaries.
//!
//! Values are read through a lookup function so tests can supply a map
//! instead of mutating the process environment.

use std::str::FromStr;
use std::time::Duration;

use wfm_orchestration_core::domain::WORKFLOW_MANAGER_SOURCE;
use wfm_orchestration_core::graph::DEFAULT_BACKUP_DATABASE;
use wfm_orchestration_core::polling::{
    PollPolicy, DEFAULT_INITIAL_DELAY_SECS, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS,
};

pub const DEFAULT_EVENT_BUS_NAME: &str = "OrcaBusMain";

const INITIAL_DELAY_VAR: &str = "BACKUP_INITIAL_DELAY_SECS";
const POLL_INTERVAL_VAR: &str = "BACKUP_POLL_INTERVAL_SECS";
const TIMEOUT_VAR: &str = "BACKUP_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be configured")]
    Missing { name: &'static str },

    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::Missing { name }),
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => {
            let trimmed = value.trim();
            trimmed.parse().map_err(|error: T::Err| ConfigError::Invalid {
                name,
                value: trimmed.to_string(),
                reason: error.to_string(),
            })
        }
        _ => Ok(default),
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    pub event_bus_name: String,
    pub own_source: String,
    pub legacy_state_change_function: String,
    pub workflow_run_update_function: String,
    pub analysis_run_update_function: String,
}

impl RouterConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            event_bus_name: optional(&lookup, "EVENT_BUS_NAME", DEFAULT_EVENT_BUS_NAME),
            own_source: optional(&lookup, "OWN_EVENT_SOURCE", WORKFLOW_MANAGER_SOURCE),
            legacy_state_change_function: required(&lookup, "LEGACY_WRSC_HANDLER_FUNCTION")?,
            workflow_run_update_function: required(&lookup, "WRU_HANDLER_FUNCTION")?,
            analysis_run_update_function: required(&lookup, "ARU_HANDLER_FUNCTION")?,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub backup_state_machine_arn: String,
    pub backup_database: String,
    pub migration_function_name: String,
    pub poll_policy: PollPolicy,
}

impl OrchestratorConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let initial_delay = parsed(&lookup, INITIAL_DELAY_VAR, DEFAULT_INITIAL_DELAY_SECS)?;
        let interval = parsed(&lookup, POLL_INTERVAL_VAR, DEFAULT_POLL_INTERVAL_SECS)?;
        let timeout = parsed(&lookup, TIMEOUT_VAR, DEFAULT_TIMEOUT_SECS)?;
        let poll_policy = PollPolicy::new(
            Duration::from_secs(initial_delay),
            Duration::from_secs(interval),
            Duration::from_secs(timeout),
        )
        .map_err(|error| ConfigError::Invalid {
            name: POLL_INTERVAL_VAR,
            value: interval.to_string(),
            reason: error.to_string(),
        })?;

        Ok(Self {
            backup_state_machine_arn: required(&lookup, "BACKUP_STATE_MACHINE_ARN")?,
            backup_database: optional(&lookup, "BACKUP_DATABASE", DEFAULT_BACKUP_DATABASE),
            migration_function_name: required(&lookup, "MIGRATION_FUNCTION_NAME")?,
            poll_policy,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerConfig {
    pub orchestrator_function_name: String,
}

impl TriggerConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            orchestrator_function_name: required(&lookup, "ORCHESTRATOR_FUNCTION_NAME")?,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }
}
