use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::GraphError;

pub const MIGRATION_GRAPH_NAME: &str = "orcabus-workflow-manager-migration";
pub const BACKUP_STEP_NAME: &str = "ExecuteBackup";
pub const MIGRATION_STEP_NAME: &str = "MigrationLambdaInvoke";
pub const START_STATE_NAME: &str = "StartState";
pub const SUCCESS_STATE_NAME: &str = "SuccessState";
pub const DEFAULT_BACKUP_DATABASE: &str = "workflow_manager";

/// How the orchestrator waits on a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepMode {
    /// Block on the step's direct synchronous result.
    RequestResponse,
    /// Start an external job and block until it reports a terminal status,
    /// not merely until it is accepted.
    FireAndWaitForJob,
}

impl fmt::Display for StepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestResponse => f.write_str("REQUEST_RESPONSE"),
            Self::FireAndWaitForJob => f.write_str("FIRE_AND_WAIT_FOR_JOB"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Backup,
    Migration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub name: String,
    pub kind: StepKind,
    pub mode: StepMode,
    /// State machine ARN or function name the step invokes.
    pub target: String,
    pub input: Value,
}

impl ExecutionStep {
    /// Backup of `database`, run as a job the orchestrator waits out.
    pub fn backup(target: impl Into<String>, database: &str) -> Self {
        Self {
            name: BACKUP_STEP_NAME.to_string(),
            kind: StepKind::Backup,
            mode: StepMode::FireAndWaitForJob,
            target: target.into(),
            input: json!({
                "commands": ["upload", "--dump-db", "--database", database],
            }),
        }
    }

    /// The migration function is self-contained and takes an empty payload.
    pub fn migration(target: impl Into<String>) -> Self {
        Self {
            name: MIGRATION_STEP_NAME.to_string(),
            kind: StepKind::Migration,
            mode: StepMode::RequestResponse,
            target: target.into(),
            input: json!({}),
        }
    }
}

/// A strictly sequential backup-then-migrate chain.
///
/// There is exactly one path from start to success and no branching, so the
/// graph is stored as its two steps rather than as a general DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionGraph {
    name: String,
    backup: ExecutionStep,
    migration: ExecutionStep,
}

impl ExecutionGraph {
    pub fn new(name: impl Into<String>, steps: Vec<ExecutionStep>) -> Result<Self, GraphError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(GraphError::UnnamedGraph);
        }

        let mut seen = BTreeSet::new();
        for step in &steps {
            if step.name.trim().is_empty() {
                return Err(GraphError::UnnamedStep);
            }
            if !seen.insert(step.name.as_str()) {
                return Err(GraphError::DuplicateStep {
                    name: step.name.clone(),
                });
            }
            if step.target.trim().is_empty() {
                return Err(GraphError::MissingTarget {
                    name: step.name.clone(),
                });
            }
        }

        let mut steps = steps.into_iter();
        let (backup, migration) = match (steps.next(), steps.next(), steps.next()) {
            (Some(backup), Some(migration), None)
                if backup.kind == StepKind::Backup && migration.kind == StepKind::Migration =>
            {
                (backup, migration)
            }
            _ => return Err(GraphError::InvalidShape),
        };

        if backup.mode != StepMode::FireAndWaitForJob {
            return Err(GraphError::WrongMode {
                name: backup.name,
                expected: StepMode::FireAndWaitForJob.to_string(),
            });
        }
        if migration.mode != StepMode::RequestResponse {
            return Err(GraphError::WrongMode {
                name: migration.name,
                expected: StepMode::RequestResponse.to_string(),
            });
        }

        Ok(Self {
            name,
            backup,
            migration,
        })
    }

    pub fn backup_then_migrate(
        backup_target: impl Into<String>,
        database: &str,
        migration_target: impl Into<String>,
    ) -> Result<Self, GraphError> {
        Self::new(
            MIGRATION_GRAPH_NAME,
            vec![
                ExecutionStep::backup(backup_target, database),
                ExecutionStep::migration(migration_target),
            ],
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backup_step(&self) -> &ExecutionStep {
        &self.backup
    }

    pub fn migration_step(&self) -> &ExecutionStep {
        &self.migration
    }

    pub fn steps(&self) -> [&ExecutionStep; 2] {
        [&self.backup, &self.migration]
    }

    /// Named states from entry to terminal success.
    pub fn state_names(&self) -> Vec<&str> {
        vec![
            START_STATE_NAME,
            self.backup.name.as_str(),
            self.migration.name.as_str(),
            SUCCESS_STATE_NAME,
        ]
    }
}
