//! Shared fixtures for mission integration tests.
//!
//! [`PlanJson`] builds planner output the way a planning agent would emit
//! it. [`Snapshot`] holds the resolved records of a plan in memory and
//! offers the status flips a caller would persist between engine calls.

use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use mission_engine::engine::{Mutation, apply_mutations};
use mission_engine::graph::PlanGraph;
use mission_engine::models::{
    Edge, Phase, PhaseStatus, Plan, Task, TaskStatus, TestResult,
};
use mission_engine::plan::{PlannerOutput, ResolvedPlan, ingest_plan, normalize_plan};

/// Agents every fixture plan may reference.
pub const KNOWN_AGENTS: &[&str] = &["coder", "reviewer", "tester"];

// ---------------------------------------------------------------------------
// Planner JSON
// ---------------------------------------------------------------------------

/// A planner task with the required fields filled in, assigned to `coder`.
pub fn task_json(key: &str) -> Value {
    json!({
        "key": key,
        "title": format!("Task {key}"),
        "instructions": format!("Carry out {key}."),
        "agent_id": "coder",
    })
}

/// [`task_json`] with `depends_on` set.
pub fn task_depending_on(key: &str, depends_on: &[&str]) -> Value {
    let mut task = task_json(key);
    task["depends_on"] = json!(depends_on);
    task
}

/// Builder for a planner output object.
#[derive(Debug, Clone)]
pub struct PlanJson {
    value: Value,
}

impl PlanJson {
    pub fn new(title: &str) -> Self {
        Self {
            value: json!({ "title": title, "phases": [] }),
        }
    }

    /// Append a phase with the given gate type and tasks.
    pub fn phase(mut self, title: &str, gate_type: &str, tasks: Vec<Value>) -> Self {
        if let Some(phases) = self.value["phases"].as_array_mut() {
            phases.push(json!({
                "title": title,
                "gate_type": gate_type,
                "tasks": tasks,
            }));
        }
        self
    }

    pub fn circuit_breaker(mut self, on_task_failure: &str, max_phase_failures: u32) -> Self {
        self.value["circuit_breaker"] = json!({
            "on_task_failure": on_task_failure,
            "max_phase_failures": max_phase_failures,
        });
        self
    }

    pub fn build(self) -> Value {
        self.value
    }

    /// The plan wrapped in prose and a fenced block, as an agent replies.
    pub fn to_agent_reply(&self) -> String {
        let body = serde_json::to_string_pretty(&self.value)
            .unwrap_or_else(|e| panic!("fixture plan must serialize: {e}"));
        format!("Here is the plan.\n\n```json\n{body}\n```\n\nLet me know if anything should change.")
    }

    /// Parse, validate, and decode against [`KNOWN_AGENTS`].
    pub fn ingest(&self) -> PlannerOutput {
        ingest_plan(&self.to_agent_reply(), KNOWN_AGENTS)
            .unwrap_or_else(|e| panic!("fixture plan must ingest: {e}"))
    }
}

/// The two-phase plan used across engine tests.
///
/// Phase 0 (`all_complete`): `x`, and `y` depending on `x`.
/// Phase 1 (`all_complete`): `z`.
pub fn two_phase_plan() -> PlanJson {
    PlanJson::new("Two phases")
        .phase(
            "Build",
            "all_complete",
            vec![task_json("x"), task_depending_on("y", &["x"])],
        )
        .phase("Ship", "all_complete", vec![task_json("z")])
}

// ---------------------------------------------------------------------------
// Resolved snapshots
// ---------------------------------------------------------------------------

/// Normalize a planner output and resolve it with freshly minted ids.
pub fn resolved_plan(output: &PlannerOutput) -> ResolvedPlan {
    let normalized = normalize_plan(output, Uuid::new_v4(), 1, "planner");
    normalized
        .resolve(&normalized.mint_ids())
        .unwrap_or_else(|e| panic!("minted ids must resolve: {e}"))
}

/// In-memory state of one plan between engine calls.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub plan: Plan,
    pub phases: Vec<Phase>,
    pub tasks: Vec<Task>,
    pub edges: Vec<Edge>,
    pub tests: Vec<TestResult>,
}

impl Snapshot {
    pub fn new(resolved: ResolvedPlan) -> Self {
        Self {
            plan: resolved.plan,
            phases: resolved.phases,
            tasks: resolved.tasks,
            edges: resolved.edges,
            tests: Vec::new(),
        }
    }

    pub fn from_json(plan: &PlanJson) -> Self {
        Self::new(resolved_plan(&plan.ingest()))
    }

    pub fn graph(&self) -> PlanGraph<'_> {
        PlanGraph::new(&self.phases, &self.tasks, &self.edges)
    }

    pub fn task(&self, key: &str) -> &Task {
        self.tasks
            .iter()
            .find(|t| t.key == key)
            .unwrap_or_else(|| panic!("no task with key {key:?}"))
    }

    pub fn task_id(&self, key: &str) -> Uuid {
        self.task(key).id
    }

    pub fn phase(&self, index: u32) -> &Phase {
        self.phases
            .iter()
            .find(|p| p.phase_index == index)
            .unwrap_or_else(|| panic!("no phase with index {index}"))
    }

    pub fn phase_status(&self, index: u32) -> PhaseStatus {
        self.phase(index).status
    }

    pub fn status(&self, key: &str) -> TaskStatus {
        self.task(key).status
    }

    /// Keys of tasks currently `ready`, in sort order.
    pub fn ready_keys(&self) -> Vec<&str> {
        let mut ready: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Ready)
            .collect();
        ready.sort_by_key(|t| t.sort_order);
        ready.iter().map(|t| t.key.as_str()).collect()
    }

    pub fn apply(&mut self, mutations: &[Mutation]) {
        apply_mutations(mutations, &mut self.phases, &mut self.tasks)
            .unwrap_or_else(|e| panic!("mutations must apply: {e}"));
    }

    /// Mark a task `done` with the given output.
    pub fn complete(&mut self, key: &str, output: &str) -> Uuid {
        let task = self.task_mut(key);
        task.status = TaskStatus::Done;
        task.output = Some(output.to_owned());
        task.completed_at = Some(Utc::now());
        task.id
    }

    pub fn fail(&mut self, key: &str, error: &str) -> Uuid {
        let task = self.task_mut(key);
        task.status = TaskStatus::Failed;
        task.error = Some(error.to_owned());
        task.id
    }

    pub fn set_status(&mut self, key: &str, status: TaskStatus) -> Uuid {
        let task = self.task_mut(key);
        task.status = status;
        task.id
    }

    pub fn record_test(&mut self, phase_index: u32, name: &str, passed: bool) {
        let phase_id = self.phase(phase_index).id;
        self.tests.push(TestResult {
            phase_id,
            name: name.to_owned(),
            passed,
        });
    }

    fn task_mut(&mut self, key: &str) -> &mut Task {
        self.tasks
            .iter_mut()
            .find(|t| t.key == key)
            .unwrap_or_else(|| panic!("no task with key {key:?}"))
    }
}
