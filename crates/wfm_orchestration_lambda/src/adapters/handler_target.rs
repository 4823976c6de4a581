use std::sync::Arc;

use wfm_orchestration_core::envelope::EventEnvelope;
use wfm_orchestration_core::error::HandlerInvocationError;
use wfm_orchestration_core::registry::EventHandler;

use crate::adapters::invoke::FunctionInvoker;

/// A domain handler deployed as its own Lambda function. The envelope is
/// forwarded unchanged as an asynchronous invocation.
pub struct LambdaHandlerTarget<I> {
    invoker: Arc<I>,
    function_name: String,
}

impl<I> LambdaHandlerTarget<I> {
    pub fn new(invoker: Arc<I>, function_name: impl Into<String>) -> Self {
        Self {
            invoker,
            function_name: function_name.into(),
        }
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }
}

impl<I> EventHandler for LambdaHandlerTarget<I>
where
    I: FunctionInvoker + Send + Sync,
{
    fn handle(&self, envelope: &EventEnvelope) -> Result<(), HandlerInvocationError> {
        let payload = serde_json::to_vec(envelope)
            .map_err(|error| HandlerInvocationError::new(format!("invalid envelope: {error}")))?;

        let status_code = self
            .invoker
            .invoke_async(&self.function_name, &payload)
            .map_err(HandlerInvocationError::new)?;

        if !(200..300).contains(&status_code) {
            return Err(HandlerInvocationError::new(format!(
                "{} rejected event with status {status_code}",
                self.function_name
            )));
        }
        Ok(())
    }
}
