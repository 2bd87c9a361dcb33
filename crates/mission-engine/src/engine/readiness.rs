//! DAG readiness.
//!
//! A task is ready when it is `pending` and every `blocks` source feeding it
//! is `done` or `skipped`. Priority and agent availability play no part.

use uuid::Uuid;

use crate::graph::PlanGraph;
use crate::models::{Task, TaskStatus};

use super::context::upstream_context;
use super::{EngineError, Mutation};

/// Pending tasks of a phase whose blockers have all finished.
pub fn ready_tasks<'a>(graph: &PlanGraph<'a>, phase_id: Uuid) -> Vec<&'a Task> {
    graph
        .phase_tasks(phase_id)
        .filter(|t| t.status == TaskStatus::Pending && graph.is_unblocked(t))
        .collect()
}

/// Recompute readiness in the phase of a task that just finished.
///
/// Only `pending` siblings in the same phase are considered, so tasks may
/// depend on each other within one phase. Returns one
/// [`Mutation::MarkTaskReady`] per newly unblocked task, carrying its
/// injected upstream context. A task that is not `done` or `skipped`
/// unblocks nothing.
pub fn reevaluate_after_completion(
    graph: &PlanGraph<'_>,
    completed_task_id: Uuid,
) -> Result<Vec<Mutation>, EngineError> {
    let completed = graph.task(completed_task_id)?;
    if !completed.status.is_finished() {
        tracing::debug!(
            task_key = %completed.key,
            status = %completed.status,
            "task has not finished; nothing to re-evaluate"
        );
        return Ok(Vec::new());
    }

    let mutations = ready_mutations(graph, completed.phase_id);
    tracing::debug!(
        task_key = %completed.key,
        phase_id = %completed.phase_id,
        unblocked = mutations.len(),
        "re-evaluated phase readiness"
    );
    Ok(mutations)
}

/// `MarkTaskReady` mutations for every ready task of a phase.
pub(crate) fn ready_mutations(graph: &PlanGraph<'_>, phase_id: Uuid) -> Vec<Mutation> {
    ready_tasks(graph, phase_id)
        .into_iter()
        .map(|task| Mutation::MarkTaskReady {
            task_id: task.id,
            task_key: task.key.clone(),
            input_context: upstream_context(graph, task),
        })
        .collect()
}
