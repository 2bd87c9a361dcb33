//! Per-invocation view of a plan's phases, tasks, and edges.
//!
//! [`PlanGraph`] borrows a caller-supplied snapshot and builds index arenas
//! once, so readiness and context lookups are linear in tasks plus edges.

use std::collections::HashMap;

use uuid::Uuid;

use crate::engine::EngineError;
use crate::models::{Edge, EdgeType, Phase, PhaseStatus, Task};

pub struct PlanGraph<'a> {
    phases: &'a [Phase],
    tasks: &'a [Task],
    phase_by_id: HashMap<Uuid, usize>,
    task_by_id: HashMap<Uuid, usize>,
    /// Sources of inbound `blocks` edges, per task.
    blocked_by: Vec<Vec<usize>>,
    /// Tasks with a `blocks` edge from a task missing in the snapshot.
    dangling_blocker: Vec<bool>,
    /// Sources of inbound edges of any type, per task.
    upstream: Vec<Vec<usize>>,
}

impl<'a> PlanGraph<'a> {
    pub fn new(phases: &'a [Phase], tasks: &'a [Task], edges: &[Edge]) -> Self {
        let phase_by_id = phases.iter().enumerate().map(|(i, p)| (p.id, i)).collect();
        let task_by_id: HashMap<Uuid, usize> =
            tasks.iter().enumerate().map(|(i, t)| (t.id, i)).collect();

        let mut blocked_by = vec![Vec::new(); tasks.len()];
        let mut dangling_blocker = vec![false; tasks.len()];
        let mut upstream = vec![Vec::new(); tasks.len()];

        for edge in edges {
            let Some(&target) = task_by_id.get(&edge.target_task_id) else {
                tracing::warn!(
                    target_task_id = %edge.target_task_id,
                    "edge targets a task missing from the snapshot; ignoring"
                );
                continue;
            };
            match task_by_id.get(&edge.source_task_id) {
                Some(&source) => {
                    if edge.edge_type == EdgeType::Blocks {
                        blocked_by[target].push(source);
                    }
                    upstream[target].push(source);
                }
                None => {
                    tracing::warn!(
                        source_task_id = %edge.source_task_id,
                        target_task_id = %edge.target_task_id,
                        edge_type = %edge.edge_type,
                        "edge source missing from the snapshot"
                    );
                    if edge.edge_type == EdgeType::Blocks {
                        dangling_blocker[target] = true;
                    }
                }
            }
        }

        Self {
            phases,
            tasks,
            phase_by_id,
            task_by_id,
            blocked_by,
            dangling_blocker,
            upstream,
        }
    }

    pub fn phases(&self) -> &'a [Phase] {
        self.phases
    }

    pub fn tasks(&self) -> &'a [Task] {
        self.tasks
    }

    pub fn phase(&self, phase_id: Uuid) -> Result<&'a Phase, EngineError> {
        self.phase_by_id
            .get(&phase_id)
            .map(|&i| &self.phases[i])
            .ok_or(EngineError::UnknownPhase(phase_id))
    }

    pub fn task(&self, task_id: Uuid) -> Result<&'a Task, EngineError> {
        self.task_by_id
            .get(&task_id)
            .map(|&i| &self.tasks[i])
            .ok_or(EngineError::UnknownTask(task_id))
    }

    /// Tasks belonging to a phase, in snapshot order.
    pub fn phase_tasks(&self, phase_id: Uuid) -> impl Iterator<Item = &'a Task> + use<'a> {
        self.tasks.iter().filter(move |t| t.phase_id == phase_id)
    }

    /// The phase with the given index, if any.
    pub fn phase_at(&self, phase_index: u32) -> Option<&'a Phase> {
        self.phases.iter().find(|p| p.phase_index == phase_index)
    }

    /// The phase with the lowest index.
    pub fn first_phase(&self) -> Option<&'a Phase> {
        self.phases.iter().min_by_key(|p| p.phase_index)
    }

    /// The single active phase, `None` before activation or after completion.
    pub fn active_phase(&self) -> Result<Option<&'a Phase>, EngineError> {
        let mut active = self
            .phases
            .iter()
            .filter(|p| p.status == PhaseStatus::Active);
        let first = active.next();
        let rest: Vec<Uuid> = active.map(|p| p.id).collect();
        match first {
            Some(phase) if !rest.is_empty() => {
                let mut ids = vec![phase.id];
                ids.extend(rest);
                Err(EngineError::MultipleActivePhases(ids))
            }
            other => Ok(other),
        }
    }

    /// Whether every `blocks` source of the task is done or skipped.
    pub fn is_unblocked(&self, task: &Task) -> bool {
        let Some(&i) = self.task_by_id.get(&task.id) else {
            return false;
        };
        !self.dangling_blocker[i]
            && self.blocked_by[i]
                .iter()
                .all(|&source| self.tasks[source].status.is_finished())
    }

    /// Sources of every inbound edge (`blocks` or `informs`).
    pub fn upstream_of(&self, task: &Task) -> Vec<&'a Task> {
        let tasks = self.tasks;
        self.task_by_id
            .get(&task.id)
            .map(|&i| self.upstream[i].iter().map(|&s| &tasks[s]).collect())
            .unwrap_or_default()
    }
}
