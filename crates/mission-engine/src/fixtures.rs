//! Record builders for unit tests.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::models::{Edge, EdgeType, GateType, Phase, PhaseStatus, Priority, Task, TaskStatus};

pub(crate) fn phase(index: u32, status: PhaseStatus) -> Phase {
    Phase {
        id: Uuid::new_v4(),
        plan_id: Uuid::nil(),
        phase_index: index,
        title: format!("phase {index}"),
        description: None,
        gate_type: GateType::AllComplete,
        status,
        started_at: None,
        completed_at: None,
    }
}

pub(crate) fn gated_phase(index: u32, status: PhaseStatus, gate_type: GateType) -> Phase {
    Phase {
        gate_type,
        ..phase(index, status)
    }
}

pub(crate) fn task(key: &str, phase_id: Uuid, status: TaskStatus) -> Task {
    Task {
        id: Uuid::new_v4(),
        plan_id: Uuid::nil(),
        phase_id,
        key: key.to_owned(),
        title: key.to_owned(),
        instructions: String::new(),
        agent_id: "coder".to_owned(),
        status,
        priority: Priority::Medium,
        domains: vec![],
        review_enabled: false,
        review_agent_id: None,
        max_revisions: 1,
        revision_round: 0,
        input_context: BTreeMap::new(),
        output: None,
        output_artifacts: vec![],
        error: None,
        sort_order: 0,
        started_at: None,
        completed_at: None,
    }
}

pub(crate) fn edge(source: &Task, target: &Task, edge_type: EdgeType) -> Edge {
    Edge {
        plan_id: Uuid::nil(),
        source_task_id: source.id,
        target_task_id: target.id,
        edge_type,
    }
}

pub(crate) fn blocks(source: &Task, target: &Task) -> Edge {
    edge(source, target, EdgeType::Blocks)
}
