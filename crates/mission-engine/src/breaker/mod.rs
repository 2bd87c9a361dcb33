//! Circuit breaker: halt a phase or the whole mission after task failures.
//!
//! Only the active phase is inspected. A snapshot with several active
//! phases is logged and the first one is used. `stop_phase` waits for
//! `max_phase_failures` failed tasks; `stop_mission` trips on the first
//! failure; `continue` never trips.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::engine::Mutation;
use crate::models::{
    CircuitBreakerConfig, FailurePolicy, Phase, PhaseStatus, Task, TaskStatus,
};

/// What the caller should do about failures in the active phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CircuitAction {
    None,
    StopPhase { phase_id: Uuid, failures: u32 },
    StopMission { phase_id: Uuid, failures: u32 },
}

impl CircuitAction {
    pub fn is_stop(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for CircuitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("no action"),
            Self::StopPhase { phase_id, failures } => {
                write!(f, "stop phase {phase_id} after {failures} failed task(s)")
            }
            Self::StopMission { phase_id, failures } => write!(
                f,
                "stop mission at phase {phase_id} after {failures} failed task(s)"
            ),
        }
    }
}

/// Count failed tasks in the active phase and apply the failure policy.
pub fn evaluate_circuit_breaker(
    phases: &[Phase],
    tasks: &[Task],
    config: &CircuitBreakerConfig,
) -> CircuitAction {
    let mut active_phases = phases.iter().filter(|p| p.status == PhaseStatus::Active);
    let Some(active) = active_phases.next() else {
        return CircuitAction::None;
    };
    let others: Vec<Uuid> = active_phases.map(|p| p.id).collect();
    if !others.is_empty() {
        tracing::warn!(
            phase_id = %active.id,
            other_active = ?others,
            "more than one phase is active; inspecting the first"
        );
    }

    let failures = tasks
        .iter()
        .filter(|t| t.phase_id == active.id && t.status == TaskStatus::Failed)
        .count();
    let failures = u32::try_from(failures).unwrap_or(u32::MAX);
    if failures == 0 {
        return CircuitAction::None;
    }

    let reached = failures >= config.max_phase_failures;
    let action = match config.on_task_failure {
        FailurePolicy::Continue => CircuitAction::None,
        // Eager: one failure stops the mission regardless of the threshold.
        FailurePolicy::StopMission => CircuitAction::StopMission {
            phase_id: active.id,
            failures,
        },
        FailurePolicy::StopPhase if reached => CircuitAction::StopPhase {
            phase_id: active.id,
            failures,
        },
        FailurePolicy::StopPhase => CircuitAction::None,
    };

    if action.is_stop() {
        tracing::warn!(
            phase_id = %active.id,
            failures,
            max_phase_failures = config.max_phase_failures,
            policy = %config.on_task_failure,
            "circuit breaker tripped"
        );
    } else {
        tracing::debug!(
            phase_id = %active.id,
            failures,
            max_phase_failures = config.max_phase_failures,
            "circuit breaker holding"
        );
    }
    action
}

/// Mutations that carry out a circuit-breaker action.
///
/// `StopPhase` fails the tripped phase and skips its `pending` and `ready`
/// tasks. `StopMission` also skips every `pending` phase and its `pending`
/// tasks. In-flight and finished tasks are left alone.
pub fn halt_mutations(
    action: &CircuitAction,
    phases: &[Phase],
    tasks: &[Task],
    now: DateTime<Utc>,
) -> Vec<Mutation> {
    let (phase_id, whole_mission) = match *action {
        CircuitAction::None => return Vec::new(),
        CircuitAction::StopPhase { phase_id, .. } => (phase_id, false),
        CircuitAction::StopMission { phase_id, .. } => (phase_id, true),
    };

    let mut mutations = vec![Mutation::FailPhase {
        phase_id,
        completed_at: now,
    }];
    mutations.extend(
        tasks
            .iter()
            .filter(|t| {
                t.phase_id == phase_id
                    && matches!(t.status, TaskStatus::Pending | TaskStatus::Ready)
            })
            .map(skip_task),
    );

    if whole_mission {
        for phase in phases
            .iter()
            .filter(|p| p.id != phase_id && p.status == PhaseStatus::Pending)
        {
            mutations.push(Mutation::SkipPhase { phase_id: phase.id });
            mutations.extend(
                tasks
                    .iter()
                    .filter(|t| t.phase_id == phase.id && t.status == TaskStatus::Pending)
                    .map(skip_task),
            );
        }
    }

    tracing::info!(
        phase_id = %phase_id,
        whole_mission,
        mutations = mutations.len(),
        "halting execution"
    );
    mutations
}

fn skip_task(task: &Task) -> Mutation {
    Mutation::SkipTask {
        task_id: task.id,
        task_key: task.key.clone(),
    }
}
