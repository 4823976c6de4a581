use serde::Deserialize;
use serde_json::Value;
use wfm_orchestration_core::error::{GraphError, TransitionError};
use wfm_orchestration_core::graph::ExecutionGraph;
use wfm_orchestration_core::run::OrchestrationRun;
use wfm_orchestration_core::runner::{run_graph, StepExecutor};
use wfm_orchestration_core::trigger::new_run_id;

use crate::config::OrchestratorConfig;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct OrchestratorRequest {
    #[serde(default)]
    pub run_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorHandlerError {
    #[error("invalid orchestrator request: {0}")]
    InvalidRequest(#[source] serde_json::Error),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

pub fn build_graph(config: &OrchestratorConfig) -> Result<ExecutionGraph, GraphError> {
    ExecutionGraph::backup_then_migrate(
        &config.backup_state_machine_arn,
        &config.backup_database,
        &config.migration_function_name,
    )
}

/// Runs the graph to a terminal phase. A `FAILED` run is still an `Ok`
/// response: the invocation itself succeeded and must not be retried, since
/// a retry would repeat a backup or a partially applied migration.
pub fn handle_orchestrator_event(
    event: Value,
    graph: &ExecutionGraph,
    executor: &dyn StepExecutor,
) -> Result<OrchestrationRun, OrchestratorHandlerError> {
    let request = match event {
        Value::Null => OrchestratorRequest::default(),
        other => serde_json::from_value::<OrchestratorRequest>(other)
            .map_err(OrchestratorHandlerError::InvalidRequest)?,
    };
    let run_id = request
        .run_id
        .filter(|run_id| !run_id.trim().is_empty())
        .unwrap_or_else(new_run_id);

    tracing::info!(
        component = "migration_orchestrator",
        run_id = %run_id,
        graph = graph.name(),
        "run started"
    );

    Ok(run_graph(graph, executor, run_id)?)
}
