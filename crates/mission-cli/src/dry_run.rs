//! `mission dry-run <file>`: simulate a plan end to end in memory.
//!
//! Every ready task completes with synthetic output (or fails, when named
//! with `--fail`), `test_pass` gates receive one passing synthetic result,
//! and the engine's mutations are applied after each step. The run stops at
//! the end of the plan, at a blocked gate, or when the circuit breaker trips.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use mission_engine::breaker::{CircuitAction, evaluate_circuit_breaker, halt_mutations};
use mission_engine::engine::{
    Advance, Mutation, activate_plan, apply_mutations, reevaluate_after_completion,
    try_advance_phase,
};
use mission_engine::gate::{GateBlocker, GateVerdict, evaluate_gate};
use mission_engine::graph::PlanGraph;
use mission_engine::models::{
    CircuitBreakerConfig, Edge, GateType, Phase, Task, TaskStatus, TestResult,
};
use mission_engine::plan::ResolvedPlan;

use crate::config::MissionConfig;
use crate::plan_cmds::{load_plan, normalize, read_input};

pub struct DryRunArgs<'a> {
    pub file: &'a str,
    pub approve_manual: bool,
    pub fail: &'a [String],
}

/// How a simulated run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Blocked { phase_index: u32, blocker: GateBlocker },
    Halted(CircuitAction),
}

pub fn cmd_dry_run(config: &MissionConfig, args: &DryRunArgs<'_>) -> Result<()> {
    let text = read_input(args.file)?;
    let output = load_plan(&text, &config.agents)?;
    let normalized = normalize(config, output, Uuid::new_v4(), 1, "dry-run");
    let resolved = normalized
        .resolve(&normalized.mint_ids())
        .context("failed to assign ids to normalized plan")?;

    println!("Dry run: {}", resolved.plan.title);
    let failing: BTreeSet<&str> = args.fail.iter().map(String::as_str).collect();
    let mut sim = Simulation::new(resolved, args.approve_manual, failing);
    match sim.run()? {
        Outcome::Completed => println!("Plan complete."),
        Outcome::Blocked {
            phase_index,
            blocker,
        } => println!("Stopped at phase {phase_index}: {blocker}"),
        Outcome::Halted(action) => println!("Circuit breaker tripped: {action}"),
    }
    Ok(())
}

// -----------------------------------------------------------------------
// Simulation
// -----------------------------------------------------------------------

pub struct Simulation<'f> {
    phases: Vec<Phase>,
    tasks: Vec<Task>,
    edges: Vec<Edge>,
    breaker: CircuitBreakerConfig,
    approve_manual: bool,
    failing: BTreeSet<&'f str>,
}

impl<'f> Simulation<'f> {
    pub fn new(resolved: ResolvedPlan, approve_manual: bool, failing: BTreeSet<&'f str>) -> Self {
        Self {
            breaker: resolved.plan.circuit_breaker,
            phases: resolved.phases,
            tasks: resolved.tasks,
            edges: resolved.edges,
            approve_manual,
            failing,
        }
    }

    pub fn run(&mut self) -> Result<Outcome> {
        let activation = activate_plan(&self.graph(), Utc::now())?;
        self.apply(&activation)?;
        self.print_phase_start();

        loop {
            if let Some(action) = self.drain_ready()? {
                let mutations = halt_mutations(&action, &self.phases, &self.tasks, Utc::now());
                self.apply(&mutations)?;
                return Ok(Outcome::Halted(action));
            }

            let (phase_index, verdict) = {
                let graph = self.graph();
                let Some(active) = graph.active_phase()? else {
                    return Ok(Outcome::Completed);
                };
                (active.phase_index, self.verdict(active))
            };

            let advance = try_advance_phase(&self.graph(), &verdict, Utc::now())?;
            match advance {
                Advance::Blocked(blocker) => {
                    return Ok(Outcome::Blocked {
                        phase_index,
                        blocker,
                    });
                }
                Advance::Advanced { mutations, .. } => {
                    println!("Phase {phase_index} complete.");
                    self.apply(&mutations)?;
                    self.print_phase_start();
                }
                Advance::Finished { mutations, .. } => {
                    println!("Phase {phase_index} complete.");
                    self.apply(&mutations)?;
                    return Ok(Outcome::Completed);
                }
            }
        }
    }

    pub fn task_status(&self, key: &str) -> Option<TaskStatus> {
        self.tasks.iter().find(|t| t.key == key).map(|t| t.status)
    }

    fn graph(&self) -> PlanGraph<'_> {
        PlanGraph::new(&self.phases, &self.tasks, &self.edges)
    }

    fn apply(&mut self, mutations: &[Mutation]) -> Result<()> {
        apply_mutations(mutations, &mut self.phases, &mut self.tasks)
            .context("failed to apply engine mutations")
    }

    /// Run ready tasks until none are left, checking the breaker after each failure.
    fn drain_ready(&mut self) -> Result<Option<CircuitAction>> {
        loop {
            let mut ready: Vec<(u32, Uuid)> = self
                .tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Ready)
                .map(|t| (t.sort_order, t.id))
                .collect();
            if ready.is_empty() {
                return Ok(None);
            }
            ready.sort_unstable();

            for (_, task_id) in ready {
                if self.finish_task(task_id) == TaskStatus::Failed {
                    let action = evaluate_circuit_breaker(&self.phases, &self.tasks, &self.breaker);
                    if action.is_stop() {
                        return Ok(Some(action));
                    }
                    continue;
                }
                let unblocked = reevaluate_after_completion(&self.graph(), task_id)?;
                self.apply(&unblocked)?;
            }
        }
    }

    fn finish_task(&mut self, task_id: Uuid) -> TaskStatus {
        let now = Utc::now();
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) else {
            return TaskStatus::Pending;
        };
        task.started_at = Some(now);
        task.completed_at = Some(now);
        if self.failing.contains(task.key.as_str()) {
            task.status = TaskStatus::Failed;
            task.error = Some("simulated failure".to_owned());
            println!("  failed {}", task.key);
        } else {
            task.status = TaskStatus::Done;
            task.output = Some(format!("{} output", task.key));
            println!("  done   {} ({} upstream input(s))", task.key, task.input_context.len());
        }
        task.status
    }

    fn verdict(&self, active: &Phase) -> GateVerdict {
        let mut tests = Vec::new();
        if active.gate_type == GateType::TestPass {
            tests.push(TestResult {
                phase_id: active.id,
                name: "dry-run".to_owned(),
                passed: true,
            });
        }
        match evaluate_gate(active, &self.tasks, &tests) {
            GateVerdict::Unsatisfied(GateBlocker::ManualApprovalRequired) if self.approve_manual => {
                println!("  manual approval granted for phase {}", active.phase_index);
                GateVerdict::Satisfied
            }
            verdict => verdict,
        }
    }

    fn print_phase_start(&self) {
        if let Ok(Some(active)) = self.graph().active_phase() {
            println!(
                "Phase {} active: {} (gate: {})",
                active.phase_index, active.title, active.gate_type
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use mission_engine::plan::normalize_plan;
    use mission_test_utils::{PlanJson, task_depending_on, task_json, two_phase_plan};

    use super::*;

    fn simulate(
        plan: &PlanJson,
        approve_manual: bool,
        failing: &[&'static str],
    ) -> (Outcome, Simulation<'static>) {
        let output = plan.ingest();
        let normalized = normalize_plan(&output, Uuid::new_v4(), 1, "test");
        let resolved = normalized.resolve(&normalized.mint_ids()).unwrap();
        let mut sim = Simulation::new(resolved, approve_manual, failing.iter().copied().collect());
        let outcome = sim.run().unwrap();
        (outcome, sim)
    }

    #[test]
    fn two_phase_plan_completes() {
        let (outcome, sim) = simulate(&two_phase_plan(), false, &[]);
        assert_eq!(outcome, Outcome::Completed);
        for key in ["x", "y", "z"] {
            assert_eq!(sim.task_status(key), Some(TaskStatus::Done));
        }
    }

    #[test]
    fn manual_gate_stops_unless_approved() {
        let plan = PlanJson::new("Manual")
            .phase("Draft", "manual_approval", vec![task_json("a")])
            .phase("Ship", "test_pass", vec![task_json("b")]);

        let (outcome, sim) = simulate(&plan, false, &[]);
        assert_eq!(
            outcome,
            Outcome::Blocked {
                phase_index: 0,
                blocker: GateBlocker::ManualApprovalRequired
            }
        );
        assert_eq!(sim.task_status("b"), Some(TaskStatus::Pending));

        let (outcome, _) = simulate(&plan, true, &[]);
        assert_eq!(outcome, Outcome::Completed);
    }

    #[test]
    fn failures_trip_the_breaker() {
        let plan = PlanJson::new("Fragile")
            .phase(
                "Build",
                "all_complete",
                vec![task_json("a"), task_json("b"), task_depending_on("c", &["a"])],
            )
            .phase("Ship", "all_complete", vec![task_json("ship")])
            .circuit_breaker("stop_mission", 3);

        let (outcome, sim) = simulate(&plan, false, &["a"]);
        assert!(matches!(
            outcome,
            Outcome::Halted(CircuitAction::StopMission { failures: 1, .. })
        ));
        assert_eq!(sim.task_status("b"), Some(TaskStatus::Skipped));
        assert_eq!(sim.task_status("c"), Some(TaskStatus::Skipped));
        assert_eq!(sim.task_status("ship"), Some(TaskStatus::Skipped));
    }

    #[test]
    fn failure_below_threshold_blocks_the_gate() {
        let plan = PlanJson::new("Fragile")
            .phase("Build", "all_complete", vec![task_json("a"), task_json("b")])
            .circuit_breaker("stop_phase", 2);

        let (outcome, _) = simulate(&plan, false, &["a"]);
        assert_eq!(
            outcome,
            Outcome::Blocked {
                phase_index: 0,
                blocker: GateBlocker::TasksOutstanding(vec!["a".to_string()])
            }
        );
    }
}
