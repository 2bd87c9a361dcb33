//! Graph & gate engine: phase activation, readiness, and upstream context.
//!
//! Every operation reads a [`PlanGraph`](crate::graph::PlanGraph) snapshot
//! and returns the [`Mutation`]s the caller should persist. Nothing here
//! writes state; [`apply_mutations`] exists for callers that keep the
//! snapshot in memory.

pub mod activation;
pub mod context;
pub mod readiness;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Phase, PhaseStatus, Plan, PlanStatus, Task, TaskStatus};

pub use activation::{Advance, activate_plan, advance_phase, try_advance_phase};
pub use context::inject_upstream_context;
pub use readiness::{reevaluate_after_completion, ready_tasks};

/// Caller contract violations detected while reading a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("task {0} not found")]
    UnknownTask(Uuid),

    #[error("phase {0} not found")]
    UnknownPhase(Uuid),

    #[error("plan {0} not found")]
    UnknownPlan(Uuid),

    #[error("phase {0} is already active")]
    PhaseAlreadyActive(Uuid),

    #[error("more than one phase is active: {0:?}")]
    MultipleActivePhases(Vec<Uuid>),

    #[error("no phase is active")]
    NoActivePhase,

    #[error("plan {plan_id} has status {status}, expected draft")]
    PlanNotDraft { plan_id: Uuid, status: PlanStatus },
}

/// A state change the caller should apply and persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    ActivatePhase {
        phase_id: Uuid,
        started_at: DateTime<Utc>,
    },
    CompletePhase {
        phase_id: Uuid,
        completed_at: DateTime<Utc>,
    },
    FailPhase {
        phase_id: Uuid,
        completed_at: DateTime<Utc>,
    },
    SkipPhase {
        phase_id: Uuid,
    },
    /// The task is unblocked; `input_context` replaces its current context.
    MarkTaskReady {
        task_id: Uuid,
        task_key: String,
        input_context: BTreeMap<String, String>,
    },
    SkipTask {
        task_id: Uuid,
        task_key: String,
    },
    ApprovePlan {
        plan_id: Uuid,
        approved_by: String,
        approved_at: DateTime<Utc>,
    },
    SupersedePlan {
        plan_id: Uuid,
    },
}

impl Mutation {
    /// Apply a phase or task mutation to an in-memory snapshot.
    ///
    /// Plan mutations are ignored here; see [`Mutation::apply_to_plans`].
    pub fn apply_to(&self, phases: &mut [Phase], tasks: &mut [Task]) -> Result<(), EngineError> {
        match self {
            Self::ActivatePhase {
                phase_id,
                started_at,
            } => {
                let phase = find_phase(phases, *phase_id)?;
                phase.status = PhaseStatus::Active;
                phase.started_at = Some(*started_at);
            }
            Self::CompletePhase {
                phase_id,
                completed_at,
            } => {
                let phase = find_phase(phases, *phase_id)?;
                phase.status = PhaseStatus::Completed;
                phase.completed_at = Some(*completed_at);
            }
            Self::FailPhase {
                phase_id,
                completed_at,
            } => {
                let phase = find_phase(phases, *phase_id)?;
                phase.status = PhaseStatus::Failed;
                phase.completed_at = Some(*completed_at);
            }
            Self::SkipPhase { phase_id } => {
                find_phase(phases, *phase_id)?.status = PhaseStatus::Skipped;
            }
            Self::MarkTaskReady {
                task_id,
                input_context,
                ..
            } => {
                let task = find_task(tasks, *task_id)?;
                task.status = TaskStatus::Ready;
                task.input_context = input_context.clone();
            }
            Self::SkipTask { task_id, .. } => {
                find_task(tasks, *task_id)?.status = TaskStatus::Skipped;
            }
            Self::ApprovePlan { .. } | Self::SupersedePlan { .. } => {}
        }
        Ok(())
    }

    /// Apply a plan mutation to an in-memory list of plan versions.
    ///
    /// Phase and task mutations are ignored here.
    pub fn apply_to_plans(&self, plans: &mut [Plan]) -> Result<(), EngineError> {
        match self {
            Self::ApprovePlan {
                plan_id,
                approved_by,
                approved_at,
            } => {
                let plan = find_plan(plans, *plan_id)?;
                plan.status = PlanStatus::Approved;
                plan.approved_by = Some(approved_by.clone());
                plan.approved_at = Some(*approved_at);
            }
            Self::SupersedePlan { plan_id } => {
                find_plan(plans, *plan_id)?.status = PlanStatus::Superseded;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Apply a batch of mutations in order.
pub fn apply_mutations(
    mutations: &[Mutation],
    phases: &mut [Phase],
    tasks: &mut [Task],
) -> Result<(), EngineError> {
    for mutation in mutations {
        mutation.apply_to(phases, tasks)?;
    }
    Ok(())
}

fn find_phase(phases: &mut [Phase], phase_id: Uuid) -> Result<&mut Phase, EngineError> {
    phases
        .iter_mut()
        .find(|p| p.id == phase_id)
        .ok_or(EngineError::UnknownPhase(phase_id))
}

fn find_task(tasks: &mut [Task], task_id: Uuid) -> Result<&mut Task, EngineError> {
    tasks
        .iter_mut()
        .find(|t| t.id == task_id)
        .ok_or(EngineError::UnknownTask(task_id))
}

fn find_plan(plans: &mut [Plan], plan_id: Uuid) -> Result<&mut Plan, EngineError> {
    plans
        .iter_mut()
        .find(|p| p.id == plan_id)
        .ok_or(EngineError::UnknownPlan(plan_id))
}
