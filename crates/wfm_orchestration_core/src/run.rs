//! Orchestration run state machine.
//!
//! A run moves `STARTED -> AWAITING_BACKUP -> AWAITING_MIGRATION -> SUCCEEDED`
//! and may drop to `FAILED` from any non-terminal phase. The state is a
//! tagged union that carries the evidence for being in it: a run can only be
//! `AwaitingMigration` while holding a successful backup report, so the
//! migration step is unreachable without one.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransitionError;
use crate::graph::StepKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Started,
    AwaitingBackup,
    AwaitingMigration,
    Succeeded,
    Failed,
}

impl RunPhase {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn can_transition_to(&self, target: Self) -> bool {
        match self {
            Self::Started => matches!(target, Self::AwaitingBackup | Self::Failed),
            Self::AwaitingBackup => matches!(target, Self::AwaitingMigration | Self::Failed),
            Self::AwaitingMigration => matches!(target, Self::Succeeded | Self::Failed),
            Self::Succeeded | Self::Failed => false,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "STARTED"),
            Self::AwaitingBackup => write!(f, "AWAITING_BACKUP"),
            Self::AwaitingMigration => write!(f, "AWAITING_MIGRATION"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Terminal result of one step invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepOutcome {
    Succeeded {
        output: Value,
    },
    Failed {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },
    TimedOut {
        after_secs: u64,
    },
}

impl StepOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
            cause: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: String,
    pub kind: StepKind,
    pub outcome: StepOutcome,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "failed_step", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunFailure {
    /// Migration was never invoked.
    BackupStepFailure { backup: StepReport },
    /// A fresh backup exists, so this is the recoverable failure mode.
    MigrationStepFailure {
        backup: StepReport,
        migration: StepReport,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Started,
    AwaitingBackup,
    AwaitingMigration {
        backup: StepReport,
    },
    Succeeded {
        backup: StepReport,
        migration: StepReport,
    },
    Failed {
        failure: RunFailure,
    },
}

impl RunState {
    pub fn phase(&self) -> RunPhase {
        match self {
            Self::Started => RunPhase::Started,
            Self::AwaitingBackup => RunPhase::AwaitingBackup,
            Self::AwaitingMigration { .. } => RunPhase::AwaitingMigration,
            Self::Succeeded { .. } => RunPhase::Succeeded,
            Self::Failed { .. } => RunPhase::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: RunPhase,
    pub to: RunPhase,
    pub at: DateTime<Utc>,
}

/// One instantiation of the execution graph. Never reused: a failed run is
/// terminal and a retry means a new run from `STARTED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationRun {
    run_id: String,
    graph_name: String,
    created_at: DateTime<Utc>,
    state: RunState,
    transitions: Vec<Transition>,
}

impl OrchestrationRun {
    pub fn new(run_id: impl Into<String>, graph_name: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            graph_name: graph_name.into(),
            created_at: Utc::now(),
            state: RunState::Started,
            transitions: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn graph_name(&self) -> &str {
        &self.graph_name
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn phase(&self) -> RunPhase {
        self.state.phase()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase().is_terminal()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Phases in the order the run entered them, starting at `STARTED`.
    pub fn phase_history(&self) -> Vec<RunPhase> {
        std::iter::once(RunPhase::Started)
            .chain(self.transitions.iter().map(|transition| transition.to))
            .collect()
    }

    pub fn reached(&self, phase: RunPhase) -> bool {
        self.phase_history().contains(&phase)
    }

    pub fn begin_backup(&mut self) -> Result<(), TransitionError> {
        self.transition(RunState::AwaitingBackup)
    }

    /// Records the backup's terminal outcome. Only a success opens the way
    /// to the migration phase.
    pub fn complete_backup(&mut self, backup: StepReport) -> Result<(), TransitionError> {
        self.expect_step(&backup, StepKind::Backup, RunPhase::AwaitingBackup)?;

        let next = if backup.outcome.is_success() {
            RunState::AwaitingMigration { backup }
        } else {
            RunState::Failed {
                failure: RunFailure::BackupStepFailure { backup },
            }
        };
        self.transition(next)
    }

    pub fn complete_migration(&mut self, migration: StepReport) -> Result<(), TransitionError> {
        self.expect_step(&migration, StepKind::Migration, RunPhase::AwaitingMigration)?;

        let RunState::AwaitingMigration { backup } = &self.state else {
            return Err(TransitionError::InvalidTransition {
                from: self.phase(),
                to: RunPhase::Succeeded,
            });
        };
        let backup = backup.clone();

        let next = if migration.outcome.is_success() {
            RunState::Succeeded { backup, migration }
        } else {
            RunState::Failed {
                failure: RunFailure::MigrationStepFailure { backup, migration },
            }
        };
        self.transition(next)
    }

    fn expect_step(
        &self,
        report: &StepReport,
        kind: StepKind,
        phase: RunPhase,
    ) -> Result<(), TransitionError> {
        if self.phase() != phase {
            return Err(TransitionError::InvalidTransition {
                from: self.phase(),
                to: match kind {
                    StepKind::Backup => RunPhase::AwaitingMigration,
                    StepKind::Migration => RunPhase::Succeeded,
                },
            });
        }
        if report.kind != kind {
            return Err(TransitionError::WrongStep {
                step: report.step.clone(),
                phase,
            });
        }
        Ok(())
    }

    fn transition(&mut self, next: RunState) -> Result<(), TransitionError> {
        let from = self.phase();
        let to = next.phase();
        if !from.can_transition_to(to) {
            return Err(TransitionError::InvalidTransition { from, to });
        }

        tracing::info!(
            component = "migration_orchestrator",
            run_id = %self.run_id,
            from = %from,
            to = %to,
            "run transition"
        );
        self.transitions.push(Transition {
            from,
            to,
            at: Utc::now(),
        });
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn report(kind: StepKind, outcome: StepOutcome) -> StepReport {
        StepReport {
            step: match kind {
                StepKind::Backup => "ExecuteBackup".to_string(),
                StepKind::Migration => "MigrationLambdaInvoke".to_string(),
            },
            kind,
            outcome,
            elapsed_ms: 1,
        }
    }

    fn ok() -> StepOutcome {
        StepOutcome::Succeeded { output: json!({}) }
    }

    #[test]
    fn terminal_phases_accept_no_transitions() {
        for phase in [RunPhase::Succeeded, RunPhase::Failed] {
            assert!(phase.is_terminal());
            for target in [
                RunPhase::Started,
                RunPhase::AwaitingBackup,
                RunPhase::AwaitingMigration,
                RunPhase::Succeeded,
                RunPhase::Failed,
            ] {
                assert!(!phase.can_transition_to(target));
            }
        }
    }

    #[test]
    fn successful_run_walks_every_phase_in_order() {
        let mut run = OrchestrationRun::new("run-1", "graph");
        run.begin_backup().expect("begin backup");
        let backup = report(StepKind::Backup, ok());
        run.complete_backup(backup).expect("backup");
        let migration = report(StepKind::Migration, ok());
        run.complete_migration(migration).expect("migration");

        assert_eq!(
            run.phase_history(),
            vec![
                RunPhase::Started,
                RunPhase::AwaitingBackup,
                RunPhase::AwaitingMigration,
                RunPhase::Succeeded,
            ]
        );
        assert!(run.is_terminal());
    }

    #[test]
    fn failed_backup_is_terminal() {
        let mut run = OrchestrationRun::new("run-1", "graph");
        run.begin_backup().expect("begin backup");
        let backup = report(StepKind::Backup, StepOutcome::failed("pg_dump exited 1"));
        run.complete_backup(backup)
            .expect("backup failure is a valid transition");

        assert_eq!(run.phase(), RunPhase::Failed);
        assert!(!run.reached(RunPhase::AwaitingMigration));

        let error = run
            .complete_migration(report(StepKind::Migration, ok()))
            .expect_err("migration after failed backup must be rejected");
        assert!(matches!(error, TransitionError::InvalidTransition { .. }));
        assert_eq!(run.phase(), RunPhase::Failed);
    }

    #[test]
    fn migration_cannot_complete_before_backup() {
        let mut run = OrchestrationRun::new("run-1", "graph");
        run.begin_backup().expect("begin backup");

        let error = run
            .complete_migration(report(StepKind::Migration, ok()))
            .expect_err("migration without backup must be rejected");
        assert_eq!(
            error,
            TransitionError::InvalidTransition {
                from: RunPhase::AwaitingBackup,
                to: RunPhase::Succeeded,
            }
        );
    }

    #[test]
    fn rejects_report_for_the_wrong_step() {
        let mut run = OrchestrationRun::new("run-1", "graph");
        run.begin_backup().expect("begin backup");

        let error = run
            .complete_backup(report(StepKind::Migration, ok()))
            .expect_err("migration report cannot complete backup");
        assert_eq!(
            error,
            TransitionError::WrongStep {
                step: "MigrationLambdaInvoke".to_string(),
                phase: RunPhase::AwaitingBackup,
            }
        );
    }

    #[test]
    fn run_cannot_begin_twice() {
        let mut run = OrchestrationRun::new("run-1", "graph");
        run.begin_backup().expect("begin backup");

        assert_eq!(
            run.begin_backup().expect_err("second begin"),
            TransitionError::InvalidTransition {
                from: RunPhase::AwaitingBackup,
                to: RunPhase::AwaitingBackup,
            }
        );
    }

    #[test]
    fn failed_migration_keeps_backup_evidence() {
        let mut run = OrchestrationRun::new("run-1", "graph");
        run.begin_backup().expect("begin backup");
        let backup = report(StepKind::Backup, ok());
        run.complete_backup(backup).expect("backup");
        let migration = report(StepKind::Migration, StepOutcome::failed("Unhandled"));
        run.complete_migration(migration)
            .expect("migration failure is a valid transition");

        match run.state() {
            RunState::Failed {
                failure: RunFailure::MigrationStepFailure { backup, .. },
            } => assert!(backup.outcome.is_success()),
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn serializes_state_as_tagged_union() {
        let mut run = OrchestrationRun::new("run-1", "graph");
        run.begin_backup().expect("begin backup");
        let timed_out = StepOutcome::TimedOut { after_secs: 600 };
        run.complete_backup(report(StepKind::Backup, timed_out))
            .expect("timeout is a failure transition");

        let value = serde_json::to_value(&run).expect("run should serialize");
        assert_eq!(value["state"]["state"], json!("FAILED"));
        assert_eq!(
            value["state"]["failure"]["failed_step"],
            json!("BACKUP_STEP_FAILURE")
        );
        assert_eq!(
            value["state"]["failure"]["backup"]["outcome"],
            json!({"status": "TIMED_OUT", "after_secs": 600})
        );

        let restored: OrchestrationRun = serde_json::from_value(value).expect("run should parse");
        assert_eq!(restored, run);
    }
}
