use std::time::Duration;

use serde_json::Value;

use crate::error::PollPolicyError;
use crate::graph::ExecutionStep;
use crate::run::StepOutcome;

pub const DEFAULT_INITIAL_DELAY_SECS: u64 = 45;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Running,
    Succeeded { output: Value },
    Failed {
        error: String,
        cause: Option<String>,
    },
}

/// An external job runner that reports completion asynchronously, such as a
/// state machine execution.
pub trait JobMonitor {
    /// Starts the job and returns a handle for status queries.
    fn start_job(&self, target: &str, input: &Value) -> Result<String, String>;
    fn job_status(&self, handle: &str) -> Result<JobStatus, String>;
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Timing for a fire-and-wait job. The interval is always positive so every
/// poll moves the run toward its timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    initial_delay: Duration,
    interval: Duration,
    timeout: Duration,
}

impl PollPolicy {
    pub fn new(
        initial_delay: Duration,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Self, PollPolicyError> {
        if interval.is_zero() {
            return Err(PollPolicyError::ZeroInterval);
        }

        Ok(Self {
            initial_delay,
            interval,
            timeout,
        })
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(DEFAULT_INITIAL_DELAY_SECS),
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Starts the step's job and blocks until it reaches a terminal status or
/// the policy's timeout elapses. Acceptance of the job is not success.
///
/// Status queries that fail are treated as transient and retried on the
/// next tick; the timeout bounds how long that can go on. No sleep runs past
/// the timeout.
pub fn wait_for_job(
    monitor: &dyn JobMonitor,
    sleeper: &dyn Sleeper,
    policy: &PollPolicy,
    step: &ExecutionStep,
) -> StepOutcome {
    let handle = match monitor.start_job(&step.target, &step.input) {
        Ok(handle) => handle,
        Err(reason) => {
            tracing::error!(
                component = "job_poller",
                step = %step.name,
                target = %step.target,
                error = %reason,
                "job start failed"
            );
            return StepOutcome::Failed {
                error: "JobStartFailed".to_string(),
                cause: Some(reason),
            };
        }
    };

    tracing::info!(
        component = "job_poller",
        step = %step.name,
        handle = %handle,
        "job started"
    );

    let mut waited = policy.initial_delay.min(policy.timeout);
    sleeper.sleep(waited);

    loop {
        match monitor.job_status(&handle) {
            Ok(JobStatus::Succeeded { output }) => {
                tracing::info!(
                    component = "job_poller",
                    step = %step.name,
                    handle = %handle,
                    waited_secs = waited.as_secs(),
                    "job succeeded"
                );
                return StepOutcome::Succeeded { output };
            }
            Ok(JobStatus::Failed { error, cause }) => {
                tracing::error!(
                    component = "job_poller",
                    step = %step.name,
                    handle = %handle,
                    error = %error,
                    "job failed"
                );
                return StepOutcome::Failed { error, cause };
            }
            Ok(JobStatus::Running) => {}
            Err(reason) => {
                tracing::warn!(
                    component = "job_poller",
                    step = %step.name,
                    handle = %handle,
                    error = %reason,
                    "job status unavailable"
                );
            }
        }

        if waited >= policy.timeout {
            tracing::error!(
                component = "job_poller",
                step = %step.name,
                handle = %handle,
                waited_secs = waited.as_secs(),
                "job timed out"
            );
            return StepOutcome::TimedOut {
                after_secs: waited.as_secs(),
            };
        }

        let pause = policy.interval.min(policy.timeout - waited);
        sleeper.sleep(pause);
        waited += pause;
    }
}
