//! Sequential execution of a backup-then-migrate graph.

use std::time::Instant;

use crate::error::TransitionError;
use crate::graph::{ExecutionGraph, ExecutionStep};
use crate::run::{OrchestrationRun, RunPhase, StepOutcome, StepReport};

/// Invokes one step and blocks until its terminal outcome is known.
///
/// Implementations must honour the step's mode: a job step only returns once
/// the job itself finished, never on mere acceptance.
pub trait StepExecutor {
    fn execute(&self, step: &ExecutionStep) -> StepOutcome;
}

/// Runs `graph` to a terminal phase under a fresh run id.
///
/// The migration step is only invoked when the backup step reported
/// success. A returned `Ok` may still hold a `FAILED` run; `Err` means the
/// state machine itself was driven incorrectly.
pub fn run_graph(
    graph: &ExecutionGraph,
    executor: &dyn StepExecutor,
    run_id: impl Into<String>,
) -> Result<OrchestrationRun, TransitionError> {
    let mut run = OrchestrationRun::new(run_id, graph.name());

    run.begin_backup()?;
    let backup = execute_step(&run, executor, graph.backup_step());
    run.complete_backup(backup)?;

    if run.phase() == RunPhase::AwaitingMigration {
        let migration = execute_step(&run, executor, graph.migration_step());
        run.complete_migration(migration)?;
    } else {
        tracing::warn!(
            component = "migration_orchestrator",
            run_id = run.run_id(),
            skipped_step = %graph.migration_step().name,
            "migration skipped after backup failure"
        );
    }

    match run.phase() {
        RunPhase::Succeeded => tracing::info!(
            component = "migration_orchestrator",
            run_id = run.run_id(),
            graph = run.graph_name(),
            "run succeeded"
        ),
        phase => tracing::error!(
            component = "migration_orchestrator",
            run_id = run.run_id(),
            graph = run.graph_name(),
            phase = %phase,
            "run failed"
        ),
    }

    Ok(run)
}

fn execute_step(
    run: &OrchestrationRun,
    executor: &dyn StepExecutor,
    step: &ExecutionStep,
) -> StepReport {
    tracing::info!(
        component = "migration_orchestrator",
        run_id = run.run_id(),
        step = %step.name,
        mode = %step.mode,
        target = %step.target,
        "step started"
    );

    let started = Instant::now();
    let outcome = executor.execute(step);
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    tracing::info!(
        component = "migration_orchestrator",
        run_id = run.run_id(),
        step = %step.name,
        success = outcome.is_success(),
        elapsed_ms,
        "step finished"
    );

    StepReport {
        step: step.name.clone(),
        kind: step.kind,
        outcome,
        elapsed_ms,
    }
}
