use serde_json::Value;
use wfm_orchestration_core::error::TriggerError;
use wfm_orchestration_core::trigger::{GraphEngine, OrchestrationTrigger, RunAcknowledgement};

/// Deploy-time entry point. The event carries no parameters and is ignored.
pub fn handle_trigger_event<E: GraphEngine>(
    _event: Value,
    trigger: &OrchestrationTrigger<E>,
) -> Result<RunAcknowledgement, TriggerError> {
    trigger.start()
}
