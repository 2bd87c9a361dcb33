//! Gate evaluation per gate type.

use crate::models::{GateType, Phase, Task, TaskStatus, TestResult};

use super::{GateBlocker, GateVerdict};

/// Decide whether a phase's gate holds.
///
/// `tasks` and `tests` may span the whole plan; only entries belonging to
/// `phase` are considered. A phase without tasks is always satisfied.
pub fn evaluate_gate(phase: &Phase, tasks: &[Task], tests: &[TestResult]) -> GateVerdict {
    let phase_tasks: Vec<&Task> = tasks.iter().filter(|t| t.phase_id == phase.id).collect();
    if phase_tasks.is_empty() {
        return GateVerdict::Satisfied;
    }

    let verdict = match &phase.gate_type {
        GateType::AllComplete => all_complete(&phase_tasks),
        GateType::ReviewApproved => review_approved(&phase_tasks),
        GateType::TestPass => {
            let phase_tests: Vec<&TestResult> =
                tests.iter().filter(|r| r.phase_id == phase.id).collect();
            test_pass(&phase_tasks, &phase_tests)
        }
        GateType::ManualApproval => GateVerdict::Unsatisfied(GateBlocker::ManualApprovalRequired),
        GateType::Unrecognized(gate) => {
            tracing::warn!(
                phase_id = %phase.id,
                gate_type = %gate,
                "phase has an unknown gate type"
            );
            GateVerdict::Unsatisfied(GateBlocker::UnknownGateType(gate.clone()))
        }
    };

    tracing::debug!(
        phase_id = %phase.id,
        gate_type = %phase.gate_type,
        satisfied = verdict.is_satisfied(),
        "evaluated phase gate"
    );
    verdict
}

fn outstanding(tasks: &[&Task]) -> Vec<String> {
    tasks
        .iter()
        .filter(|t| !t.status.is_finished())
        .map(|t| t.key.clone())
        .collect()
}

fn all_complete(tasks: &[&Task]) -> GateVerdict {
    let keys = outstanding(tasks);
    if keys.is_empty() {
        GateVerdict::Satisfied
    } else {
        GateVerdict::Unsatisfied(GateBlocker::TasksOutstanding(keys))
    }
}

fn review_approved(tasks: &[&Task]) -> GateVerdict {
    let reviewed: Vec<&&Task> = tasks.iter().filter(|t| t.review_enabled).collect();
    if reviewed.is_empty() {
        return all_complete(tasks);
    }

    let keys: Vec<String> = reviewed
        .iter()
        .filter(|t| t.status != TaskStatus::Done)
        .map(|t| t.key.clone())
        .collect();
    if keys.is_empty() {
        GateVerdict::Satisfied
    } else {
        GateVerdict::Unsatisfied(GateBlocker::ReviewsOutstanding(keys))
    }
}

fn test_pass(tasks: &[&Task], tests: &[&TestResult]) -> GateVerdict {
    if tests.is_empty() {
        return GateVerdict::Unsatisfied(GateBlocker::NoTestResults);
    }

    let failing: Vec<String> = tests
        .iter()
        .filter(|r| !r.passed)
        .map(|r| r.name.clone())
        .collect();
    if !failing.is_empty() {
        return GateVerdict::Unsatisfied(GateBlocker::TestsFailing(failing));
    }

    all_complete(tasks)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::fixtures::{gated_phase, task};
    use crate::models::PhaseStatus;

    fn result(phase: &Phase, name: &str, passed: bool) -> TestResult {
        TestResult {
            phase_id: phase.id,
            name: name.to_owned(),
            passed,
        }
    }

    #[test]
    fn empty_phase_is_satisfied_for_every_gate_type() {
        let gates = [
            GateType::ManualApproval,
            GateType::TestPass,
            GateType::from("vibes".to_owned()),
        ];
        for gate in gates {
            let phase = gated_phase(0, PhaseStatus::Active, gate);
            assert!(evaluate_gate(&phase, &[], &[]).is_satisfied());
        }
    }

    #[test]
    fn all_complete_reports_outstanding_keys() {
        let phase = gated_phase(0, PhaseStatus::Active, GateType::AllComplete);
        let tasks = vec![
            task("a", phase.id, TaskStatus::Done),
            task("b", phase.id, TaskStatus::Skipped),
            task("c", phase.id, TaskStatus::Failed),
            task("d", phase.id, TaskStatus::Review),
        ];
        let verdict = evaluate_gate(&phase, &tasks, &[]);
        assert_eq!(
            verdict,
            GateVerdict::Unsatisfied(GateBlocker::TasksOutstanding(vec![
                "c".into(),
                "d".into()
            ]))
        );
    }

    #[test]
    fn tasks_of_other_phases_are_ignored() {
        let phase = gated_phase(0, PhaseStatus::Active, GateType::AllComplete);
        let tasks = vec![
            task("a", phase.id, TaskStatus::Done),
            task("other", Uuid::new_v4(), TaskStatus::Pending),
        ];
        assert!(evaluate_gate(&phase, &tasks, &[]).is_satisfied());
    }

    #[test]
    fn review_approved_without_reviews_falls_back_to_all_complete() {
        let phase = gated_phase(0, PhaseStatus::Active, GateType::ReviewApproved);
        let tasks = vec![
            task("a", phase.id, TaskStatus::Done),
            task("b", phase.id, TaskStatus::InProgress),
        ];
        assert_eq!(
            evaluate_gate(&phase, &tasks, &[]),
            GateVerdict::Unsatisfied(GateBlocker::TasksOutstanding(vec!["b".into()]))
        );
    }

    #[test]
    fn review_approved_only_checks_reviewed_tasks() {
        let phase = gated_phase(0, PhaseStatus::Active, GateType::ReviewApproved);
        let mut reviewed = task("a", phase.id, TaskStatus::Done);
        reviewed.review_enabled = true;
        let mut skipped_review = task("b", phase.id, TaskStatus::Skipped);
        skipped_review.review_enabled = true;
        let unreviewed = task("c", phase.id, TaskStatus::Pending);

        let tasks = vec![reviewed, skipped_review, unreviewed];
        assert_eq!(
            evaluate_gate(&phase, &tasks, &[]),
            GateVerdict::Unsatisfied(GateBlocker::ReviewsOutstanding(vec!["b".into()]))
        );

        let tasks = vec![tasks[0].clone(), tasks[2].clone()];
        assert!(evaluate_gate(&phase, &tasks, &[]).is_satisfied());
    }

    #[test]
    fn test_pass_needs_results_even_when_tasks_are_done() {
        let phase = gated_phase(0, PhaseStatus::Active, GateType::TestPass);
        let tasks = vec![task("a", phase.id, TaskStatus::Done)];
        assert_eq!(
            evaluate_gate(&phase, &tasks, &[]),
            GateVerdict::Unsatisfied(GateBlocker::NoTestResults)
        );

        let other_phase = gated_phase(1, PhaseStatus::Pending, GateType::TestPass);
        let foreign = vec![result(&other_phase, "unit", true)];
        assert_eq!(
            evaluate_gate(&phase, &tasks, &foreign),
            GateVerdict::Unsatisfied(GateBlocker::NoTestResults)
        );
    }

    #[test]
    fn test_pass_reports_failures_before_outstanding_tasks() {
        let phase = gated_phase(0, PhaseStatus::Active, GateType::TestPass);
        let tasks = vec![task("a", phase.id, TaskStatus::Pending)];
        let tests = vec![result(&phase, "unit", true), result(&phase, "lint", false)];
        assert_eq!(
            evaluate_gate(&phase, &tasks, &tests),
            GateVerdict::Unsatisfied(GateBlocker::TestsFailing(vec!["lint".into()]))
        );

        let tests = vec![result(&phase, "unit", true)];
        assert_eq!(
            evaluate_gate(&phase, &tasks, &tests),
            GateVerdict::Unsatisfied(GateBlocker::TasksOutstanding(vec!["a".into()]))
        );

        let tasks = vec![task("a", phase.id, TaskStatus::Done)];
        assert!(evaluate_gate(&phase, &tasks, &tests).is_satisfied());
    }

    #[test]
    fn manual_approval_is_never_satisfied() {
        let phase = gated_phase(0, PhaseStatus::Active, GateType::ManualApproval);
        let tasks = vec![task("a", phase.id, TaskStatus::Done)];
        assert_eq!(
            evaluate_gate(&phase, &tasks, &[]),
            GateVerdict::Unsatisfied(GateBlocker::ManualApprovalRequired)
        );
    }

    #[test]
    fn unknown_gate_type_is_unsatisfied() {
        let phase = gated_phase(0, PhaseStatus::Active, GateType::from("vibes".to_owned()));
        let tasks = vec![task("a", phase.id, TaskStatus::Done)];
        assert_eq!(
            evaluate_gate(&phase, &tasks, &[]),
            GateVerdict::Unsatisfied(GateBlocker::UnknownGateType("vibes".into()))
        );
    }
}
