use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use wfm_orchestration_core::graph::ExecutionGraph;
use wfm_orchestration_core::run::OrchestrationRun;
use wfm_orchestration_lambda::adapters::invoke::AwsLambdaInvoker;
use wfm_orchestration_lambda::adapters::state_machine::StepFunctionsJobMonitor;
use wfm_orchestration_lambda::adapters::step_execution::{ModeStepExecutor, TokioSleeper};
use wfm_orchestration_lambda::config::OrchestratorConfig;
use wfm_orchestration_lambda::handlers::orchestrator::{build_graph, handle_orchestrator_event};
use wfm_orchestration_lambda::observability::{init_logging, invocation_span, LogFormat};

struct Orchestrator {
    config: OrchestratorConfig,
    graph: ExecutionGraph,
    jobs: StepFunctionsJobMonitor,
    functions: AwsLambdaInvoker,
}

async fn handle_request(
    orchestrator: &Orchestrator,
    event: LambdaEvent<Value>,
) -> Result<OrchestrationRun, Error> {
    let executor = ModeStepExecutor {
        jobs: &orchestrator.jobs,
        functions: &orchestrator.functions,
        sleeper: &TokioSleeper,
        poll_policy: orchestrator.config.poll_policy,
    };

    let span = invocation_span("migration_orchestrator", &event.context.request_id);
    span.in_scope(|| {
        handle_orchestrator_event(event.payload, &orchestrator.graph, &executor)
            .map_err(|error| Error::from(error.to_string()))
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging(LogFormat::from_env());

    let config = OrchestratorConfig::from_env()
        .map_err(|error| Error::from(format!("invalid orchestrator configuration: {error}")))?;
    let graph = build_graph(&config)
        .map_err(|error| Error::from(format!("invalid execution graph: {error}")))?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let orchestrator = Orchestrator {
        config,
        graph,
        jobs: StepFunctionsJobMonitor::new(aws_sdk_sfn::Client::new(&aws_config)),
        functions: AwsLambdaInvoker::new(aws_sdk_lambda::Client::new(&aws_config)),
    };

    let orchestrator = &orchestrator;
    lambda_runtime::run(service_fn(move |event| async move {
        handle_request(orchestrator, event).await
    }))
    .await
}
