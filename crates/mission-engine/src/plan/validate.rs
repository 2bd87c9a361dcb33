//! Plan validation.
//!
//! Walks a [`RawPlan`] and reports every problem it finds as a
//! path-addressed [`ValidationError`]. Nothing here short-circuits except an
//! empty `phases` array (there is nothing else to check) and a phase without
//! tasks (its own task checks are skipped, siblings are still validated).
//!
//! Order of findings:
//! 1. Plan title.
//! 2. Per phase: title, gate type, tasks; per task: key, title,
//!    instructions, agent, priority, reviewer, and field types.
//! 3. Duplicate task keys (every occurrence after the first).
//! 4. `depends_on` / `informs` reference integrity and repeats.
//! 5. Dependency cycles, one finding per cycle, always run.
//! 6. Circuit breaker settings.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::BuildHasher;

use serde::Serialize;
use serde_json::Value;

use crate::models::{FailurePolicy, GateType, Priority};

use super::parser::RawPlan;

/// Path used for cycle findings, which span the whole plan.
pub const DEPENDENCIES_PATH: &str = "dependencies";

/// Lookup of the agents a plan may assign work to.
pub trait AgentDirectory {
    fn contains_agent(&self, agent_id: &str) -> bool;
}

impl<S: BuildHasher> AgentDirectory for HashSet<String, S> {
    fn contains_agent(&self, agent_id: &str) -> bool {
        self.contains(agent_id)
    }
}

impl AgentDirectory for BTreeSet<String> {
    fn contains_agent(&self, agent_id: &str) -> bool {
        self.contains(agent_id)
    }
}

impl AgentDirectory for [String] {
    fn contains_agent(&self, agent_id: &str) -> bool {
        self.iter().any(|a| a == agent_id)
    }
}

impl AgentDirectory for [&str] {
    fn contains_agent(&self, agent_id: &str) -> bool {
        self.contains(&agent_id)
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Location of the problem, e.g. `phases[0].tasks[2].agent_id`.
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// The complete, ordered outcome of validating a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// The dependency-relevant facts of one task, kept for the plan-wide passes.
struct TaskRef<'a> {
    path: String,
    key: Option<&'a str>,
    depends_on: Vec<&'a str>,
    informs: Vec<&'a str>,
}

/// Validate a raw plan against the given agent directory.
pub fn validate_plan<A>(plan: &RawPlan, agents: &A) -> ValidationReport
where
    A: AgentDirectory + ?Sized,
{
    let mut report = ValidationReport::default();

    if non_empty_str(plan.get("title")).is_none() {
        report.push("title", "plan title is required");
    }
    check_optional_string(&mut report, plan.get("description"), "description");

    let phases = plan
        .get("phases")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if phases.is_empty() {
        report.push("phases", "plan must contain at least one phase");
        return report;
    }

    let mut task_refs = Vec::new();
    for (p, phase) in phases.iter().enumerate() {
        check_phase(&mut report, &mut task_refs, p, phase, agents);
    }

    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for task in &task_refs {
        if let Some(key) = task.key {
            if !seen.insert(key) {
                duplicates.push(ValidationError {
                    path: format!("{}.key", task.path),
                    message: format!("duplicate task key {key:?}"),
                });
            }
        }
    }
    report.errors.extend(duplicates);

    check_references(&mut report, &task_refs, &seen);

    for cycle in find_cycles(&task_refs) {
        report.push(
            DEPENDENCIES_PATH,
            format!("dependency cycle detected: {}", cycle.join(" -> ")),
        );
    }

    check_circuit_breaker(&mut report, plan.get("circuit_breaker"));

    report
}

// ---------------------------------------------------------------------------
// Shape checks
// ---------------------------------------------------------------------------

fn check_phase<'a, A>(
    report: &mut ValidationReport,
    task_refs: &mut Vec<TaskRef<'a>>,
    index: usize,
    phase: &'a Value,
    agents: &A,
) where
    A: AgentDirectory + ?Sized,
{
    let path = format!("phases[{index}]");
    let Some(phase) = phase.as_object() else {
        report.push(path, "phase must be an object");
        return;
    };

    if non_empty_str(phase.get("title")).is_none() {
        report.push(format!("{path}.title"), "phase title is required");
    }
    check_optional_string(report, phase.get("description"), &format!("{path}.description"));

    if let Some(gate) = present(phase.get("gate_type")) {
        let known = gate.as_str().is_some_and(|g| g.parse::<GateType>().is_ok());
        if !known {
            report.push(
                format!("{path}.gate_type"),
                format!(
                    "gate_type must be one of {}, got {gate}",
                    GateType::KNOWN.map(|g| g.to_string()).join(", ")
                ),
            );
        }
    }

    let tasks = phase
        .get("tasks")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if tasks.is_empty() {
        report.push(format!("{path}.tasks"), "phase must contain at least one task");
        return;
    }

    for (t, task) in tasks.iter().enumerate() {
        let task_path = format!("{path}.tasks[{t}]");
        if let Some(task_ref) = check_task(report, task_path, task, agents) {
            task_refs.push(task_ref);
        }
    }
}

fn check_task<'a, A>(
    report: &mut ValidationReport,
    path: String,
    task: &'a Value,
    agents: &A,
) -> Option<TaskRef<'a>>
where
    A: AgentDirectory + ?Sized,
{
    let Some(task) = task.as_object() else {
        report.push(path, "task must be an object");
        return None;
    };

    let key = non_empty_str(task.get("key"));
    if key.is_none() {
        report.push(format!("{path}.key"), "task key is required");
    }
    if non_empty_str(task.get("title")).is_none() {
        report.push(format!("{path}.title"), "task title is required");
    }
    if non_empty_str(task.get("instructions")).is_none() {
        report.push(format!("{path}.instructions"), "task instructions are required");
    }

    match non_empty_str(task.get("agent_id")) {
        None => report.push(format!("{path}.agent_id"), "agent_id is required"),
        Some(agent) if !agents.contains_agent(agent) => {
            report.push(format!("{path}.agent_id"), format!("unknown agent {agent:?}"));
        }
        Some(_) => {}
    }

    if let Some(priority) = present(task.get("priority")) {
        let known = priority
            .as_str()
            .is_some_and(|p| p.parse::<Priority>().is_ok());
        if !known {
            report.push(
                format!("{path}.priority"),
                format!("priority must be one of low, medium, high, urgent, got {priority}"),
            );
        }
    }

    let review_enabled = match present(task.get("review_enabled")) {
        None => false,
        Some(Value::Bool(enabled)) => *enabled,
        Some(_) => {
            report.push(format!("{path}.review_enabled"), "review_enabled must be a boolean");
            false
        }
    };
    match present(task.get("review_agent_id")) {
        None => {}
        Some(Value::String(reviewer)) => {
            if review_enabled && !agents.contains_agent(reviewer) {
                report.push(
                    format!("{path}.review_agent_id"),
                    format!("unknown review agent {reviewer:?}"),
                );
            }
        }
        Some(_) => report.push(
            format!("{path}.review_agent_id"),
            "review_agent_id must be a string",
        ),
    }

    if let Some(max) = present(task.get("max_revisions")) {
        let in_range = max
            .as_u64()
            .is_some_and(|n| n >= 1 && u32::try_from(n).is_ok());
        if !in_range {
            report.push(
                format!("{path}.max_revisions"),
                "max_revisions must be a positive integer",
            );
        }
    }

    check_string_list(report, task.get("domains"), &format!("{path}.domains"));
    check_artifacts(report, task.get("output_artifacts"), &format!("{path}.output_artifacts"));

    let depends_on = check_string_list(report, task.get("depends_on"), &format!("{path}.depends_on"));
    let informs = check_string_list(report, task.get("informs"), &format!("{path}.informs"));

    Some(TaskRef {
        path,
        key,
        depends_on,
        informs,
    })
}

fn check_artifacts(report: &mut ValidationReport, value: Option<&Value>, path: &str) {
    let Some(value) = present(value) else {
        return;
    };
    let Some(artifacts) = value.as_array() else {
        report.push(path, "output_artifacts must be an array");
        return;
    };
    for (i, artifact) in artifacts.iter().enumerate() {
        for field in ["key", "label", "mime_type"] {
            if non_empty_str(artifact.get(field)).is_none() {
                report.push(
                    format!("{path}[{i}].{field}"),
                    format!("artifact {field} is required"),
                );
            }
        }
    }
}

fn check_circuit_breaker(report: &mut ValidationReport, value: Option<&Value>) {
    let Some(value) = present(value) else {
        return;
    };
    let Some(breaker) = value.as_object() else {
        report.push("circuit_breaker", "circuit_breaker must be an object");
        return;
    };

    let policy_known = breaker
        .get("on_task_failure")
        .and_then(Value::as_str)
        .is_some_and(|p| p.parse::<FailurePolicy>().is_ok());
    if !policy_known {
        report.push(
            "circuit_breaker.on_task_failure",
            "on_task_failure must be one of stop_phase, stop_mission, continue",
        );
    }

    let threshold_ok = breaker
        .get("max_phase_failures")
        .and_then(Value::as_u64)
        .is_some_and(|n| n >= 1 && u32::try_from(n).is_ok());
    if !threshold_ok {
        report.push(
            "circuit_breaker.max_phase_failures",
            "max_phase_failures must be an integer >= 1",
        );
    }
}

// ---------------------------------------------------------------------------
// Plan-wide checks
// ---------------------------------------------------------------------------

fn check_references(report: &mut ValidationReport, tasks: &[TaskRef<'_>], keys: &HashSet<&str>) {
    for task in tasks {
        let mut seen = HashSet::new();
        for dep in &task.depends_on {
            if !seen.insert(*dep) {
                report.push(
                    format!("{}.depends_on", task.path),
                    format!("duplicate dependency {dep:?}"),
                );
            } else if task.key == Some(*dep) {
                report.push(
                    format!("{}.depends_on", task.path),
                    format!("task {dep:?} depends on itself"),
                );
            } else if !keys.contains(dep) {
                report.push(
                    format!("{}.depends_on", task.path),
                    format!("unknown dependency {dep:?}"),
                );
            }
        }
        let mut seen = HashSet::new();
        for target in &task.informs {
            if !seen.insert(*target) {
                report.push(
                    format!("{}.informs", task.path),
                    format!("duplicate informs target {target:?}"),
                );
            } else if task.key == Some(*target) {
                report.push(
                    format!("{}.informs", task.path),
                    format!("task {target:?} informs itself"),
                );
            } else if !keys.contains(target) {
                report.push(
                    format!("{}.informs", task.path),
                    format!("informs unknown task {target:?}"),
                );
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Find every dependency cycle reachable through `depends_on`.
///
/// Iterative depth-first search over an index arena built once. Each
/// revisit of a node still on the stack yields one cycle, written from the
/// re-entry point back to the repeated key. `informs` never participates.
fn find_cycles(tasks: &[TaskRef<'_>]) -> Vec<Vec<String>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut nodes: Vec<&TaskRef<'_>> = Vec::new();
    for task in tasks {
        if let Some(key) = task.key {
            // The first occurrence of a key defines its edges.
            if !index.contains_key(key) {
                index.insert(key, nodes.len());
                nodes.push(task);
            }
        }
    }

    let adjacency: Vec<Vec<usize>> = nodes
        .iter()
        .map(|task| {
            let mut next: Vec<usize> = Vec::with_capacity(task.depends_on.len());
            for &i in task.depends_on.iter().filter_map(|dep| index.get(dep)) {
                // A repeated dependency is one edge.
                if !next.contains(&i) {
                    next.push(i);
                }
            }
            next
        })
        .collect();

    let key_of = |i: usize| nodes[i].key.unwrap_or_default().to_owned();

    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut cycles = Vec::new();

    for root in 0..nodes.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::OnStack;
        // (node, position of the next neighbor to explore)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let Some(&next) = adjacency[node].get(frame.1) else {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            };
            frame.1 += 1;

            match marks[next] {
                Mark::Unvisited => {
                    marks[next] = Mark::OnStack;
                    stack.push((next, 0));
                }
                Mark::OnStack => {
                    let start = stack
                        .iter()
                        .position(|&(n, _)| n == next)
                        .unwrap_or_default();
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|&(n, _)| key_of(n)).collect();
                    cycle.push(key_of(next));
                    cycles.push(cycle);
                }
                Mark::Done => {}
            }
        }
    }

    cycles
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Treat JSON `null` the same as an absent field.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn check_optional_string(report: &mut ValidationReport, value: Option<&Value>, path: &str) {
    if present(value).is_some_and(|v| !v.is_string()) {
        report.push(path, "must be a string");
    }
}

/// Check an optional array of strings, returning the strings it holds.
fn check_string_list<'a>(
    report: &mut ValidationReport,
    value: Option<&'a Value>,
    path: &str,
) -> Vec<&'a str> {
    let Some(value) = present(value) else {
        return Vec::new();
    };
    let Some(items) = value.as_array() else {
        report.push(path, "must be an array of strings");
        return Vec::new();
    };

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(s) => out.push(s),
            None => report.push(format!("{path}[{i}]"), "must be a string"),
        }
    }
    out
}
