//! Mission plan execution engine.
//!
//! Turns planner-agent output into a validated, phased task graph and
//! decides, without side effects, how that plan progresses: which phase is
//! active, which tasks are ready, when a gate opens, what upstream output a
//! task receives, and when failures should halt execution.
//!
//! Every progression function reads a snapshot and returns
//! [`Mutation`]s; applying and persisting them is the caller's job.

pub mod breaker;
pub mod engine;
pub mod gate;
pub mod graph;
pub mod models;
pub mod plan;

#[cfg(test)]
mod fixtures;

pub use breaker::{CircuitAction, evaluate_circuit_breaker, halt_mutations};
pub use engine::{
    Advance, EngineError, Mutation, activate_plan, advance_phase, apply_mutations,
    inject_upstream_context, ready_tasks, reevaluate_after_completion, try_advance_phase,
};
pub use gate::{GateBlocker, GateVerdict, evaluate_gate};
pub use graph::PlanGraph;
pub use plan::{
    PlanError, PlannerOutput, ValidationError, ValidationReport, ingest_plan, normalize_plan,
    parse_planner_output, validate_plan,
};
