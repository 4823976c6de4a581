use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use wfm_orchestration_core::registry::Dispatcher;
use wfm_orchestration_lambda::adapters::invoke::AwsLambdaInvoker;
use wfm_orchestration_lambda::config::RouterConfig;
use wfm_orchestration_lambda::handlers::router::{
    build_dispatcher, handle_router_event, RouterResponse,
};
use wfm_orchestration_lambda::observability::{init_logging, invocation_span, LogFormat};

async fn handle_request(
    dispatcher: &Dispatcher,
    event: LambdaEvent<Value>,
) -> Result<RouterResponse, Error> {
    let span = invocation_span("event_router", &event.context.request_id);
    span.in_scope(|| {
        handle_router_event(event.payload, dispatcher)
            .map_err(|error| Error::from(error.to_string()))
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging(LogFormat::from_env());

    let config = RouterConfig::from_env()
        .map_err(|error| Error::from(format!("invalid router configuration: {error}")))?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let invoker = Arc::new(AwsLambdaInvoker::new(aws_sdk_lambda::Client::new(&aws_config)));
    let dispatcher = build_dispatcher(&config, invoker)
        .map_err(|error| Error::from(format!("invalid dispatch rules: {error}")))?;

    let dispatcher = &dispatcher;
    lambda_runtime::run(service_fn(move |event| async move {
        handle_request(dispatcher, event).await
    }))
    .await
}
