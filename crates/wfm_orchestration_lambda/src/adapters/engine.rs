use wfm_orchestration_core::trigger::{GraphEngine, StartRunRequest};

use crate::adapters::invoke::FunctionInvoker;

/// Starts runs by asynchronously invoking the orchestrator function. The
/// acceptance status is returned as soon as the invocation is queued.
pub struct LambdaGraphEngine<'a> {
    pub invoker: &'a dyn FunctionInvoker,
    pub orchestrator_function_name: String,
}

impl GraphEngine for LambdaGraphEngine<'_> {
    fn start_run(&self, request: &StartRunRequest) -> Result<u16, String> {
        let payload = serde_json::to_vec(request)
            .map_err(|error| format!("failed to encode start request: {error}"))?;
        self.invoker
            .invoke_async(&self.orchestrator_function_name, &payload)
    }
}
