//! Planner output format.
//!
//! These types map directly to the JSON object a planning agent emits and are
//! decoded via `serde` once the raw object has passed validation.

use serde::{Deserialize, Serialize};

use crate::models::{CircuitBreakerConfig, GateType, OutputArtifact, Priority};

/// Top-level structure of a planner output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannerOutput {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Failure handling policy. Absent means [`CircuitBreakerConfig::default`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    pub phases: Vec<PlannedPhase>,
}

/// A single entry of the `phases` array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedPhase {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub gate_type: GateType,
    pub tasks: Vec<PlannedTask>,
}

/// A single task within a phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedTask {
    /// Plan-wide unique key (referenced by `depends_on` and `informs`).
    pub key: String,
    pub title: String,
    pub instructions: String,
    pub agent_id: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub domains: Vec<String>,
    /// Keys of tasks that must finish before this one can start.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Keys of tasks that receive this task's output without being blocked.
    #[serde(default)]
    pub informs: Vec<String>,
    #[serde(default)]
    pub review_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_agent_id: Option<String>,
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,
    #[serde(default)]
    pub output_artifacts: Vec<OutputArtifact>,
}

fn default_max_revisions() -> u32 {
    1
}

impl PlannerOutput {
    /// Iterate over every task in phase-then-declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &PlannedTask> {
        self.phases.iter().flat_map(|phase| phase.tasks.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailurePolicy;

    #[test]
    fn deserialize_minimal_plan() {
        let json = r#"{
            "title": "Launch",
            "phases": [
                { "title": "Research",
                  "tasks": [ { "key": "scan", "title": "Scan", "instructions": "Look around",
                               "agent_id": "scout" } ] }
            ]
        }"#;
        let plan: PlannerOutput = serde_json::from_str(json).expect("should parse");
        let task = &plan.phases[0].tasks[0];
        assert_eq!(plan.phases[0].gate_type, GateType::AllComplete);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.max_revisions, 1);
        assert!(!task.review_enabled);
        assert!(task.depends_on.is_empty());
        assert!(task.informs.is_empty());
        assert!(plan.circuit_breaker.is_none());
    }

    #[test]
    fn deserialize_full_task() {
        let json = r#"{
            "title": "Launch",
            "circuit_breaker": { "on_task_failure": "stop_mission", "max_phase_failures": 2 },
            "phases": [
                { "title": "Build", "gate_type": "review_approved",
                  "tasks": [ { "key": "api", "title": "API", "instructions": "Write it",
                               "agent_id": "coder", "priority": "urgent",
                               "domains": ["backend"], "depends_on": [], "informs": ["docs"],
                               "review_enabled": true, "review_agent_id": "lead",
                               "max_revisions": 3,
                               "output_artifacts": [ { "key": "spec", "label": "API spec",
                                                        "mime_type": "text/markdown" } ] },
                             { "key": "docs", "title": "Docs", "instructions": "Explain it",
                               "agent_id": "writer" } ] }
            ]
        }"#;
        let plan: PlannerOutput = serde_json::from_str(json).expect("should parse");
        let cb = plan.circuit_breaker.expect("breaker present");
        assert_eq!(cb.on_task_failure, FailurePolicy::StopMission);
        assert_eq!(cb.max_phase_failures, 2);
        let api = &plan.phases[0].tasks[0];
        assert_eq!(api.priority, Priority::Urgent);
        assert_eq!(api.review_agent_id.as_deref(), Some("lead"));
        assert_eq!(api.output_artifacts[0].mime_type, "text/markdown");
        assert_eq!(plan.tasks().count(), 2);
    }
}
