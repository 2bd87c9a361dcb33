//! Plan normalization: flatten a validated planner output into storage rows.
//!
//! Rows carry [`PlaceholderId`]s instead of real ids. Phase rows take their
//! position in the input as `phase_index`; task rows take a `sort_order`
//! counted across all phases in traversal order. Every field the planner
//! left out gets an explicit default and every timestamp starts empty.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    CircuitBreakerConfig, Edge, EdgeType, GateType, OutputArtifact, Phase, PhaseStatus, Plan,
    PlanStatus, Priority, Task, TaskStatus,
};

use super::format::PlannerOutput;
use super::remap::{IdMap, PlaceholderId, RemapError};

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRow {
    pub placeholder: PlaceholderId,
    pub mission_id: Uuid,
    pub version: u32,
    pub status: PlanStatus,
    pub title: String,
    pub description: Option<String>,
    pub circuit_breaker: CircuitBreakerConfig,
    pub created_by: String,
    pub approved_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRow {
    pub placeholder: PlaceholderId,
    pub plan: PlaceholderId,
    pub phase_index: u32,
    pub title: String,
    pub description: Option<String>,
    pub gate_type: GateType,
    pub status: PhaseStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRow {
    pub placeholder: PlaceholderId,
    pub plan: PlaceholderId,
    pub phase: PlaceholderId,
    pub key: String,
    pub title: String,
    pub instructions: String,
    pub agent_id: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub domains: Vec<String>,
    pub review_enabled: bool,
    pub review_agent_id: Option<String>,
    pub max_revisions: u32,
    pub revision_round: u32,
    pub input_context: BTreeMap<String, String>,
    pub output: Option<String>,
    pub output_artifacts: Vec<OutputArtifact>,
    pub error: Option<String>,
    pub sort_order: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub plan: PlaceholderId,
    pub source: PlaceholderId,
    pub target: PlaceholderId,
    pub edge_type: EdgeType,
}

/// Storage-ready rows for one plan version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPlan {
    pub plan: PlanRow,
    pub phases: Vec<PhaseRow>,
    pub tasks: Vec<TaskRow>,
    pub edges: Vec<EdgeRow>,
}

/// Runtime records produced by resolving a [`NormalizedPlan`] against an
/// [`IdMap`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPlan {
    pub plan: Plan,
    pub phases: Vec<Phase>,
    pub tasks: Vec<Task>,
    pub edges: Vec<Edge>,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Flatten a validated planner output into rows.
pub fn normalize_plan(
    output: &PlannerOutput,
    mission_id: Uuid,
    version: u32,
    created_by: &str,
) -> NormalizedPlan {
    let plan_ph = PlaceholderId::plan();

    let plan = PlanRow {
        placeholder: plan_ph.clone(),
        mission_id,
        version,
        status: PlanStatus::Draft,
        title: output.title.clone(),
        description: output.description.clone(),
        circuit_breaker: output.circuit_breaker.unwrap_or_default(),
        created_by: created_by.to_owned(),
        approved_by: None,
        created_at: None,
        approved_at: None,
    };

    let mut phases = Vec::with_capacity(output.phases.len());
    let mut tasks = Vec::new();
    let mut edges = Vec::new();
    let mut sort_order = 0u32;

    for (phase_index, phase) in (0u32..).zip(&output.phases) {
        let phase_ph = PlaceholderId::phase(phase_index);

        phases.push(PhaseRow {
            placeholder: phase_ph.clone(),
            plan: plan_ph.clone(),
            phase_index,
            title: phase.title.clone(),
            description: phase.description.clone(),
            gate_type: phase.gate_type.clone(),
            status: PhaseStatus::Pending,
            started_at: None,
            completed_at: None,
        });

        for task in &phase.tasks {
            let task_ph = PlaceholderId::task(&task.key);

            for dep in unique(&task.depends_on) {
                edges.push(EdgeRow {
                    plan: plan_ph.clone(),
                    source: PlaceholderId::task(dep),
                    target: task_ph.clone(),
                    edge_type: EdgeType::Blocks,
                });
            }
            for informed in unique(&task.informs) {
                edges.push(EdgeRow {
                    plan: plan_ph.clone(),
                    source: task_ph.clone(),
                    target: PlaceholderId::task(informed),
                    edge_type: EdgeType::Informs,
                });
            }

            tasks.push(TaskRow {
                placeholder: task_ph,
                plan: plan_ph.clone(),
                phase: phase_ph.clone(),
                key: task.key.clone(),
                title: task.title.clone(),
                instructions: task.instructions.clone(),
                agent_id: task.agent_id.clone(),
                status: TaskStatus::Pending,
                priority: task.priority,
                domains: task.domains.clone(),
                review_enabled: task.review_enabled,
                review_agent_id: task.review_agent_id.clone(),
                max_revisions: task.max_revisions,
                revision_round: 0,
                input_context: BTreeMap::new(),
                output: None,
                output_artifacts: task.output_artifacts.clone(),
                error: None,
                sort_order,
                started_at: None,
                completed_at: None,
            });
            sort_order += 1;
        }
    }

    tracing::debug!(
        phases = phases.len(),
        tasks = tasks.len(),
        edges = edges.len(),
        "normalized plan"
    );

    NormalizedPlan {
        plan,
        phases,
        tasks,
        edges,
    }
}

/// Keys in first-seen order with repeats dropped.
fn unique(keys: &[String]) -> impl Iterator<Item = &String> {
    let mut seen = HashSet::new();
    keys.iter().filter(move |key| seen.insert(key.as_str()))
}

impl NormalizedPlan {
    /// Every placeholder that owns a row (plan, phases, tasks).
    pub fn placeholders(&self) -> impl Iterator<Item = &PlaceholderId> {
        std::iter::once(&self.plan.placeholder)
            .chain(self.phases.iter().map(|p| &p.placeholder))
            .chain(self.tasks.iter().map(|t| &t.placeholder))
    }

    /// Build an [`IdMap`] with a fresh random id for every placeholder.
    pub fn mint_ids(&self) -> IdMap {
        let mut ids = IdMap::new();
        ids.mint_missing(self.placeholders());
        ids
    }

    /// Swap every placeholder for its real id.
    pub fn resolve(&self, ids: &IdMap) -> Result<ResolvedPlan, RemapError> {
        let plan_id = ids.resolve(&self.plan.placeholder)?;
        let row = &self.plan;

        let plan = Plan {
            id: plan_id,
            mission_id: row.mission_id,
            version: row.version,
            status: row.status,
            title: row.title.clone(),
            description: row.description.clone(),
            circuit_breaker: row.circuit_breaker,
            created_by: row.created_by.clone(),
            approved_by: row.approved_by.clone(),
            created_at: row.created_at,
            approved_at: row.approved_at,
        };

        let phases = self
            .phases
            .iter()
            .map(|row| {
                Ok(Phase {
                    id: ids.resolve(&row.placeholder)?,
                    plan_id: ids.resolve(&row.plan)?,
                    phase_index: row.phase_index,
                    title: row.title.clone(),
                    description: row.description.clone(),
                    gate_type: row.gate_type.clone(),
                    status: row.status,
                    started_at: row.started_at,
                    completed_at: row.completed_at,
                })
            })
            .collect::<Result<Vec<_>, RemapError>>()?;

        let tasks = self
            .tasks
            .iter()
            .map(|row| {
                Ok(Task {
                    id: ids.resolve(&row.placeholder)?,
                    plan_id: ids.resolve(&row.plan)?,
                    phase_id: ids.resolve(&row.phase)?,
                    key: row.key.clone(),
                    title: row.title.clone(),
                    instructions: row.instructions.clone(),
                    agent_id: row.agent_id.clone(),
                    status: row.status,
                    priority: row.priority,
                    domains: row.domains.clone(),
                    review_enabled: row.review_enabled,
                    review_agent_id: row.review_agent_id.clone(),
                    max_revisions: row.max_revisions,
                    revision_round: row.revision_round,
                    input_context: row.input_context.clone(),
                    output: row.output.clone(),
                    output_artifacts: row.output_artifacts.clone(),
                    error: row.error.clone(),
                    sort_order: row.sort_order,
                    started_at: row.started_at,
                    completed_at: row.completed_at,
                })
            })
            .collect::<Result<Vec<_>, RemapError>>()?;

        let edges = self
            .edges
            .iter()
            .map(|row| {
                Ok(Edge {
                    plan_id: ids.resolve(&row.plan)?,
                    source_task_id: ids.resolve(&row.source)?,
                    target_task_id: ids.resolve(&row.target)?,
                    edge_type: row.edge_type,
                })
            })
            .collect::<Result<Vec<_>, RemapError>>()?;

        Ok(ResolvedPlan {
            plan,
            phases,
            tasks,
            edges,
        })
    }
}
