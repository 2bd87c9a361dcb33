//! Phase activation and advancement.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::gate::{GateBlocker, GateVerdict};
use crate::graph::PlanGraph;
use crate::models::{Phase, PhaseStatus};

use super::readiness::ready_mutations;
use super::{EngineError, Mutation};

/// Outcome of trying to move past the active phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The gate is not satisfied; nothing changes.
    Blocked(GateBlocker),
    /// The active phase completed and its successor was activated.
    Advanced {
        completed: Uuid,
        activated: Uuid,
        mutations: Vec<Mutation>,
    },
    /// The active phase completed and there is no pending successor.
    Finished {
        completed: Uuid,
        mutations: Vec<Mutation>,
    },
}

/// Start a plan: activate its lowest-index phase and mark its ready tasks.
///
/// Returns no mutations for a plan without phases or one whose first phase
/// is no longer `pending`.
pub fn activate_plan(
    graph: &PlanGraph<'_>,
    now: DateTime<Utc>,
) -> Result<Vec<Mutation>, EngineError> {
    if let Some(active) = graph.active_phase()? {
        return Err(EngineError::PhaseAlreadyActive(active.id));
    }

    let Some(first) = graph.first_phase() else {
        tracing::debug!("plan has no phases; nothing to activate");
        return Ok(Vec::new());
    };
    if first.status != PhaseStatus::Pending {
        tracing::debug!(
            phase_id = %first.id,
            status = %first.status,
            "first phase already started; nothing to activate"
        );
        return Ok(Vec::new());
    }

    Ok(activation_mutations(graph, first, now))
}

/// Advance past the active phase if the supplied gate verdict allows it.
///
/// The verdict normally comes from
/// [`evaluate_gate`](crate::gate::evaluate_gate); a caller that has recorded
/// an explicit approval for a `manual_approval` phase passes
/// [`GateVerdict::Satisfied`].
pub fn try_advance_phase(
    graph: &PlanGraph<'_>,
    verdict: &GateVerdict,
    now: DateTime<Utc>,
) -> Result<Advance, EngineError> {
    match verdict {
        GateVerdict::Satisfied => advance_phase(graph, now),
        GateVerdict::Unsatisfied(blocker) => {
            let active = graph.active_phase()?.ok_or(EngineError::NoActivePhase)?;
            tracing::debug!(
                phase_id = %active.id,
                reason = %blocker,
                "phase gate not satisfied"
            );
            Ok(Advance::Blocked(blocker.clone()))
        }
    }
}

/// Complete the active phase and activate the phase right after it.
///
/// The successor must have `phase_index` exactly one greater and still be
/// `pending`; otherwise the plan is reported as [`Advance::Finished`].
pub fn advance_phase(graph: &PlanGraph<'_>, now: DateTime<Utc>) -> Result<Advance, EngineError> {
    let current = graph.active_phase()?.ok_or(EngineError::NoActivePhase)?;

    let mut mutations = vec![Mutation::CompletePhase {
        phase_id: current.id,
        completed_at: now,
    }];

    let next = current
        .phase_index
        .checked_add(1)
        .and_then(|index| graph.phase_at(index))
        .filter(|phase| phase.status == PhaseStatus::Pending);

    match next {
        Some(next) => {
            mutations.extend(activation_mutations(graph, next, now));
            Ok(Advance::Advanced {
                completed: current.id,
                activated: next.id,
                mutations,
            })
        }
        None => {
            tracing::info!(
                phase_id = %current.id,
                phase_index = current.phase_index,
                "phase completed; no next phase"
            );
            Ok(Advance::Finished {
                completed: current.id,
                mutations,
            })
        }
    }
}

fn activation_mutations(graph: &PlanGraph<'_>, phase: &Phase, now: DateTime<Utc>) -> Vec<Mutation> {
    let mut mutations = vec![Mutation::ActivatePhase {
        phase_id: phase.id,
        started_at: now,
    }];
    mutations.extend(ready_mutations(graph, phase.id));

    tracing::info!(
        phase_id = %phase.id,
        phase_index = phase.phase_index,
        ready = mutations.len() - 1,
        "activating phase"
    );
    mutations
}
