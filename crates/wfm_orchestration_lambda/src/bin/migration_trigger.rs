use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use wfm_orchestration_core::graph::MIGRATION_GRAPH_NAME;
use wfm_orchestration_core::trigger::{OrchestrationTrigger, RunAcknowledgement};
use wfm_orchestration_lambda::adapters::engine::LambdaGraphEngine;
use wfm_orchestration_lambda::adapters::invoke::AwsLambdaInvoker;
use wfm_orchestration_lambda::config::TriggerConfig;
use wfm_orchestration_lambda::handlers::trigger::handle_trigger_event;
use wfm_orchestration_lambda::observability::{init_logging, invocation_span, LogFormat};

async fn handle_request(
    config: &TriggerConfig,
    invoker: &AwsLambdaInvoker,
    event: LambdaEvent<Value>,
) -> Result<RunAcknowledgement, Error> {
    let trigger = OrchestrationTrigger::new(
        LambdaGraphEngine {
            invoker,
            orchestrator_function_name: config.orchestrator_function_name.clone(),
        },
        MIGRATION_GRAPH_NAME,
    );

    let span = invocation_span("migration_trigger", &event.context.request_id);
    span.in_scope(|| {
        handle_trigger_event(event.payload, &trigger)
            .map_err(|error| Error::from(error.to_string()))
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging(LogFormat::from_env());

    let config = TriggerConfig::from_env()
        .map_err(|error| Error::from(format!("invalid trigger configuration: {error}")))?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let invoker = AwsLambdaInvoker::new(aws_sdk_lambda::Client::new(&aws_config));

    let (config, invoker) = (&config, &invoker);
    lambda_runtime::run(service_fn(move |event| async move {
        handle_request(config, invoker, event).await
    }))
    .await
}
