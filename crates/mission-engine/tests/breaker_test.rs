//! Circuit breaker decisions and halting over a running plan.

use chrono::Utc;

use mission_engine::breaker::{CircuitAction, evaluate_circuit_breaker, halt_mutations};
use mission_engine::engine::activate_plan;
use mission_engine::models::{PhaseStatus, TaskStatus};
use mission_test_utils::{PlanJson, Snapshot, task_depending_on, task_json};

fn running(policy: &str, max_phase_failures: u32) -> Snapshot {
    let plan = PlanJson::new("Fragile")
        .phase(
            "Build",
            "all_complete",
            vec![
                task_json("a"),
                task_json("b"),
                task_json("c"),
                task_depending_on("d", &["a"]),
            ],
        )
        .phase("Ship", "all_complete", vec![task_json("ship")])
        .circuit_breaker(policy, max_phase_failures);
    let mut s = Snapshot::from_json(&plan);
    s.apply(&activate_plan(&s.graph(), Utc::now()).unwrap());
    s
}

fn evaluate(s: &Snapshot) -> CircuitAction {
    evaluate_circuit_breaker(&s.phases, &s.tasks, &s.plan.circuit_breaker)
}

#[test]
fn stop_phase_trips_at_threshold() {
    let mut s = running("stop_phase", 2);
    assert_eq!(evaluate(&s), CircuitAction::None);

    s.fail("a", "compile error");
    assert_eq!(evaluate(&s), CircuitAction::None, "one failure is below threshold");

    s.fail("b", "timeout");
    let phase_id = s.phase(0).id;
    assert_eq!(
        evaluate(&s),
        CircuitAction::StopPhase {
            phase_id,
            failures: 2
        }
    );
}

#[test]
fn stop_mission_trips_on_a_single_failure() {
    let mut s = running("stop_mission", 3);
    s.fail("a", "boom");
    let action = evaluate(&s);
    assert!(matches!(action, CircuitAction::StopMission { failures: 1, .. }));

    let mutations = halt_mutations(&action, &s.phases, &s.tasks, Utc::now());
    s.apply(&mutations);
    assert_eq!(s.phase_status(0), PhaseStatus::Failed);
    assert_eq!(s.phase_status(1), PhaseStatus::Skipped);
    assert_eq!(s.status("a"), TaskStatus::Failed);
    for key in ["b", "c", "d", "ship"] {
        assert_eq!(s.status(key), TaskStatus::Skipped, "{key} should be skipped");
    }
    assert!(s.graph().active_phase().unwrap().is_none());
}

#[test]
fn stop_phase_leaves_later_phases_alone() {
    let mut s = running("stop_phase", 1);
    s.set_status("b", TaskStatus::InProgress);
    s.fail("a", "boom");

    let action = evaluate(&s);
    s.apply(&halt_mutations(&action, &s.phases, &s.tasks, Utc::now()));
    assert_eq!(s.phase_status(0), PhaseStatus::Failed);
    assert_eq!(s.phase_status(1), PhaseStatus::Pending);
    assert_eq!(s.status("b"), TaskStatus::InProgress, "running work is not cancelled");
    assert_eq!(s.status("c"), TaskStatus::Skipped);
    assert_eq!(s.status("d"), TaskStatus::Skipped);
    assert_eq!(s.status("ship"), TaskStatus::Pending);
}

#[test]
fn continue_policy_ignores_failures() {
    let mut s = running("continue", 1);
    s.fail("a", "boom");
    s.fail("b", "boom");
    assert_eq!(evaluate(&s), CircuitAction::None);
}
