use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wfm_orchestration_core::domain::{
    domain_rule_set, ANALYSIS_RUN_UPDATE_HANDLER, LEGACY_STATE_CHANGE_HANDLER,
    WORKFLOW_RUN_UPDATE_HANDLER,
};
use wfm_orchestration_core::envelope::EventEnvelope;
use wfm_orchestration_core::error::{ConfigurationError, EnvelopeError, RouteError};
use wfm_orchestration_core::registry::{Dispatcher, HandlerRegistry, RouteOutcome};

use crate::adapters::handler_target::LambdaHandlerTarget;
use crate::adapters::invoke::FunctionInvoker;
use crate::config::RouterConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RouterResponse {
    Dispatched {
        handler_id: String,
        rule: String,
        fingerprint: String,
    },
    Ignored {
        fingerprint: String,
    },
}

impl From<RouteOutcome> for RouterResponse {
    fn from(outcome: RouteOutcome) -> Self {
        match outcome {
            RouteOutcome::Routed {
                handler_id,
                rule,
                fingerprint,
            } => Self::Dispatched {
                handler_id: handler_id.to_string(),
                rule,
                fingerprint,
            },
            RouteOutcome::Ignored { fingerprint } => Self::Ignored { fingerprint },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouterHandlerError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Route(#[from] RouteError),
}

/// Wires the domain rule set to one Lambda target per handler.
pub fn build_dispatcher<I>(
    config: &RouterConfig,
    invoker: Arc<I>,
) -> Result<Dispatcher, ConfigurationError>
where
    I: FunctionInvoker + Send + Sync + 'static,
{
    let rules = domain_rule_set(&config.own_source)?;

    let mut registry = HandlerRegistry::new();
    registry.register(
        LEGACY_STATE_CHANGE_HANDLER,
        LambdaHandlerTarget::new(Arc::clone(&invoker), &config.legacy_state_change_function),
    )?;
    registry.register(
        WORKFLOW_RUN_UPDATE_HANDLER,
        LambdaHandlerTarget::new(Arc::clone(&invoker), &config.workflow_run_update_function),
    )?;
    registry.register(
        ANALYSIS_RUN_UPDATE_HANDLER,
        LambdaHandlerTarget::new(invoker, &config.analysis_run_update_function),
    )?;

    let rule_count = rules.bindings().len();
    let dispatcher = Dispatcher::new(rules, registry)?;
    tracing::info!(
        component = "event_router",
        event_bus = %config.event_bus_name,
        own_source = %config.own_source,
        rules = rule_count,
        "dispatcher ready"
    );
    Ok(dispatcher)
}

pub fn handle_router_event(
    event: Value,
    dispatcher: &Dispatcher,
) -> Result<RouterResponse, RouterHandlerError> {
    let envelope = EventEnvelope::from_value(event).map_err(|error| {
        tracing::warn!(component = "event_router", error = %error, "rejected malformed event");
        error
    })?;

    let outcome = dispatcher.route(&envelope)?;
    Ok(outcome.into())
}
