use std::time::Duration;

use serde_json::Value;
use wfm_orchestration_core::graph::{ExecutionStep, StepMode};
use wfm_orchestration_core::polling::{wait_for_job, JobMonitor, PollPolicy, Sleeper};
use wfm_orchestration_core::run::StepOutcome;
use wfm_orchestration_core::runner::StepExecutor;

use crate::adapters::invoke::FunctionInvoker;

/// Runs each step according to its mode: job steps through the monitor and
/// poll policy, request-response steps as synchronous function calls.
pub struct ModeStepExecutor<'a> {
    pub jobs: &'a dyn JobMonitor,
    pub functions: &'a dyn FunctionInvoker,
    pub sleeper: &'a dyn Sleeper,
    pub poll_policy: PollPolicy,
}

impl StepExecutor for ModeStepExecutor<'_> {
    fn execute(&self, step: &ExecutionStep) -> StepOutcome {
        match step.mode {
            StepMode::FireAndWaitForJob => {
                wait_for_job(self.jobs, self.sleeper, &self.poll_policy, step)
            }
            StepMode::RequestResponse => invoke_request_response(self.functions, step),
        }
    }
}

/// Suspends between polls without holding up the runtime's other tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(tokio::time::sleep(duration))
        });
    }
}

fn invoke_request_response(functions: &dyn FunctionInvoker, step: &ExecutionStep) -> StepOutcome {
    let payload = match serde_json::to_vec(&step.input) {
        Ok(bytes) => bytes,
        Err(error) => return StepOutcome::failed(format!("invalid step input: {error}")),
    };

    let response = match functions.invoke_sync(&step.target, &payload) {
        Ok(response) => response,
        Err(reason) => {
            return StepOutcome::Failed {
                error: "InvokeFailed".to_string(),
                cause: Some(reason),
            };
        }
    };

    let body = String::from_utf8_lossy(&response.payload).into_owned();
    if let Some(function_error) = response.function_error {
        return StepOutcome::Failed {
            error: function_error,
            cause: Some(body).filter(|text| !text.is_empty()),
        };
    }
    if !(200..300).contains(&response.status_code) {
        return StepOutcome::Failed {
            error: format!("InvokeStatus{}", response.status_code),
            cause: Some(body).filter(|text| !text.is_empty()),
        };
    }

    StepOutcome::Succeeded {
        output: serde_json::from_str(&body).unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use wfm_orchestration_core::graph::ExecutionGraph;
    use wfm_orchestration_core::polling::JobStatus;

    use super::*;
    use crate::adapters::invoke::InvokeResponse;

    struct CapturingInvoker {
        response: InvokeResponse,
        calls: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl FunctionInvoker for CapturingInvoker {
        fn invoke_async(&self, _function_name: &str, _payload: &[u8]) -> Result<u16, String> {
            Err("unexpected async invocation".to_string())
        }

        fn invoke_sync(
            &self,
            function_name: &str,
            payload: &[u8],
        ) -> Result<InvokeResponse, String> {
            self.calls
                .lock()
                .expect("poisoned mutex")
                .push((function_name.to_string(), payload.to_vec()));
            Ok(self.response.clone())
        }
    }

    struct ImmediateJobs;

    impl JobMonitor for ImmediateJobs {
        fn start_job(&self, _target: &str, _input: &Value) -> Result<String, String> {
            Ok("arn:execution:1".to_string())
        }

        fn job_status(&self, _handle: &str) -> Result<JobStatus, String> {
            Ok(JobStatus::Succeeded { output: json!({}) })
        }
    }

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _duration: Duration) {}
    }

    fn graph() -> ExecutionGraph {
        ExecutionGraph::backup_then_migrate("arn:sfn:backup", "workflow_manager", "wfm-migration")
            .expect("graph should build")
    }

    fn invoker(response: InvokeResponse) -> CapturingInvoker {
        CapturingInvoker {
            response,
            calls: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn migration_step_is_a_synchronous_call_with_empty_payload() {
        let functions = invoker(InvokeResponse {
            status_code: 200,
            function_error: None,
            payload: br#"{"migrated":true}"#.to_vec(),
        });
        let executor = ModeStepExecutor {
            jobs: &ImmediateJobs,
            functions: &functions,
            sleeper: &NoSleep,
            poll_policy: PollPolicy::default(),
        };

        let outcome = executor.execute(graph().migration_step());

        assert_eq!(
            outcome,
            StepOutcome::Succeeded {
                output: json!({"migrated": true})
            }
        );
        assert_eq!(
            *functions.calls.lock().expect("poisoned mutex"),
            vec![("wfm-migration".to_string(), b"{}".to_vec())]
        );
    }

    #[test]
    fn function_error_fails_the_step() {
        let functions = invoker(InvokeResponse {
            status_code: 200,
            function_error: Some("Unhandled".to_string()),
            payload: br#"{"errorMessage":"relation does not exist"}"#.to_vec(),
        });
        let executor = ModeStepExecutor {
            jobs: &ImmediateJobs,
            functions: &functions,
            sleeper: &NoSleep,
            poll_policy: PollPolicy::default(),
        };

        let outcome = executor.execute(graph().migration_step());

        assert_eq!(
            outcome,
            StepOutcome::Failed {
                error: "Unhandled".to_string(),
                cause: Some(r#"{"errorMessage":"relation does not exist"}"#.to_string()),
            }
        );
    }

    #[test]
    fn backup_step_goes_through_job_monitor() {
        let functions = invoker(InvokeResponse {
            status_code: 200,
            function_error: None,
            payload: Vec::new(),
        });
        let executor = ModeStepExecutor {
            jobs: &ImmediateJobs,
            functions: &functions,
            sleeper: &NoSleep,
            poll_policy: PollPolicy::default(),
        };

        let outcome = executor.execute(graph().backup_step());

        assert!(outcome.is_success());
        assert!(functions.calls.lock().expect("poisoned mutex").is_empty());
    }
}
