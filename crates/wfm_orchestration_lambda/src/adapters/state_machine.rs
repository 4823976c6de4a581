use serde_json::Value;
use wfm_orchestration_core::polling::{JobMonitor, JobStatus};

/// Backup jobs run as Step Functions executions.
#[derive(Debug, Clone)]
pub struct StepFunctionsJobMonitor {
    sfn_client: aws_sdk_sfn::Client,
}

impl StepFunctionsJobMonitor {
    pub fn new(sfn_client: aws_sdk_sfn::Client) -> Self {
        Self { sfn_client }
    }
}

impl JobMonitor for StepFunctionsJobMonitor {
    fn start_job(&self, target: &str, input: &Value) -> Result<String, String> {
        let client = self.sfn_client.clone();
        let state_machine_arn = target.to_string();
        let input = input.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .start_execution()
                    .state_machine_arn(&state_machine_arn)
                    .input(input)
                    .send()
                    .await
                    .map(|output| output.execution_arn().to_string())
                    .map_err(|error| {
                        format!("failed to start execution of {state_machine_arn}: {error}")
                    })
            })
        })
    }

    fn job_status(&self, handle: &str) -> Result<JobStatus, String> {
        let client = self.sfn_client.clone();
        let execution_arn = handle.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .describe_execution()
                    .execution_arn(&execution_arn)
                    .send()
                    .await
                    .map_err(|error| {
                        format!("failed to describe execution {execution_arn}: {error}")
                    })?;

                Ok::<_, String>(execution_status(
                    output.status().as_str(),
                    output.output(),
                    output.error(),
                    output.cause(),
                ))
            })
        })
    }
}

/// Maps a Step Functions execution status onto a job status. Anything other
/// than running or succeeded is terminal failure.
pub fn execution_status(
    status: &str,
    output: Option<&str>,
    error: Option<&str>,
    cause: Option<&str>,
) -> JobStatus {
    match status {
        "RUNNING" | "PENDING_REDRIVE" => JobStatus::Running,
        "SUCCEEDED" => JobStatus::Succeeded {
            output: output
                .and_then(|text| serde_json::from_str(text).ok())
                .unwrap_or(Value::Null),
        },
        other => JobStatus::Failed {
            error: error.map_or_else(|| format!("Execution{other}"), str::to_string),
            cause: cause.map(str::to_string),
        },
    }
}
