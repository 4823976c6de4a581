use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TriggerError;

pub const RUN_ID_PREFIX: &str = "wfm-migration-";

/// Payload handed to the execution engine for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRunRequest {
    pub run_id: String,
    pub graph_name: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAcknowledgement {
    pub run_id: String,
    pub graph_name: String,
    pub accepted_at: DateTime<Utc>,
    pub status_code: u16,
}

/// Something that accepts a run for asynchronous execution.
pub trait GraphEngine {
    /// Returns the engine's acceptance status code. Completion of the run
    /// is never awaited here.
    fn start_run(&self, request: &StartRunRequest) -> Result<u16, String>;
}

pub fn new_run_id() -> String {
    format!("{RUN_ID_PREFIX}{}", Uuid::new_v4())
}

/// Starts exactly one run per call and blocks only until it is accepted.
///
/// Concurrent calls are not deduplicated: each mints its own run id.
pub struct OrchestrationTrigger<E> {
    engine: E,
    graph_name: String,
}

impl<E: GraphEngine> OrchestrationTrigger<E> {
    pub fn new(engine: E, graph_name: impl Into<String>) -> Self {
        Self {
            engine,
            graph_name: graph_name.into(),
        }
    }

    pub fn graph_name(&self) -> &str {
        &self.graph_name
    }

    pub fn start(&self) -> Result<RunAcknowledgement, TriggerError> {
        self.start_with_run_id(new_run_id())
    }

    pub fn start_with_run_id(
        &self,
        run_id: impl Into<String>,
    ) -> Result<RunAcknowledgement, TriggerError> {
        let request = StartRunRequest {
            run_id: run_id.into(),
            graph_name: self.graph_name.clone(),
            requested_at: Utc::now(),
        };

        let status_code = self.engine.start_run(&request).map_err(|reason| {
            tracing::error!(
                component = "migration_trigger",
                run_id = %request.run_id,
                error = %reason,
                "engine unavailable"
            );
            TriggerError::Unavailable {
                run_id: request.run_id.clone(),
                reason,
            }
        })?;

        if !(200..300).contains(&status_code) {
            tracing::error!(
                component = "migration_trigger",
                run_id = %request.run_id,
                status_code,
                "run not accepted"
            );
            return Err(TriggerError::NotAccepted {
                run_id: request.run_id,
                status_code,
            });
        }

        tracing::info!(
            component = "migration_trigger",
            run_id = %request.run_id,
            graph = %request.graph_name,
            status_code,
            "run accepted"
        );

        Ok(RunAcknowledgement {
            run_id: request.run_id,
            graph_name: request.graph_name,
            accepted_at: Utc::now(),
            status_code,
        })
    }
}
