//! Plan versioning and approval.
//!
//! A mission keeps every plan version it ever drafted. At most one of them
//! is `approved`; approving a draft supersedes the previous approval.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::engine::{EngineError, Mutation};
use crate::models::{Plan, PlanStatus};

/// The version number a new draft for `mission_id` should carry.
pub fn next_plan_version(plans: &[Plan], mission_id: Uuid) -> u32 {
    plans
        .iter()
        .filter(|p| p.mission_id == mission_id)
        .map(|p| p.version)
        .max()
        .map_or(1, |v| v.saturating_add(1))
}

/// Approve a draft plan, superseding the mission's current approved plan.
pub fn approve_plan(
    plans: &[Plan],
    plan_id: Uuid,
    approved_by: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Mutation>, EngineError> {
    let plan = plans
        .iter()
        .find(|p| p.id == plan_id)
        .ok_or(EngineError::UnknownPlan(plan_id))?;
    if plan.status != PlanStatus::Draft {
        return Err(EngineError::PlanNotDraft {
            plan_id,
            status: plan.status,
        });
    }

    let mut mutations: Vec<Mutation> = plans
        .iter()
        .filter(|p| p.mission_id == plan.mission_id && p.status == PlanStatus::Approved)
        .map(|p| {
            tracing::info!(
                plan_id = %p.id,
                version = p.version,
                "superseding previously approved plan"
            );
            Mutation::SupersedePlan { plan_id: p.id }
        })
        .collect();

    mutations.push(Mutation::ApprovePlan {
        plan_id,
        approved_by: approved_by.to_owned(),
        approved_at: now,
    });

    tracing::info!(
        plan_id = %plan_id,
        mission_id = %plan.mission_id,
        version = plan.version,
        approved_by,
        "plan approved"
    );
    Ok(mutations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CircuitBreakerConfig;

    fn plan(mission_id: Uuid, version: u32, status: PlanStatus) -> Plan {
        Plan {
            id: Uuid::new_v4(),
            mission_id,
            version,
            status,
            title: format!("v{version}"),
            description: None,
            circuit_breaker: CircuitBreakerConfig::default(),
            created_by: "planner".to_owned(),
            approved_by: None,
            created_at: None,
            approved_at: None,
        }
    }

    #[test]
    fn next_version_starts_at_one() {
        assert_eq!(next_plan_version(&[], Uuid::new_v4()), 1);
    }

    #[test]
    fn next_version_ignores_other_missions() {
        let mission = Uuid::new_v4();
        let plans = vec![
            plan(mission, 1, PlanStatus::Superseded),
            plan(mission, 2, PlanStatus::Approved),
            plan(Uuid::new_v4(), 7, PlanStatus::Draft),
        ];
        assert_eq!(next_plan_version(&plans, mission), 3);
    }

    #[test]
    fn approving_supersedes_the_current_approval() {
        let mission = Uuid::new_v4();
        let mut plans = vec![
            plan(mission, 1, PlanStatus::Approved),
            plan(mission, 2, PlanStatus::Draft),
            plan(Uuid::new_v4(), 1, PlanStatus::Approved),
        ];
        let now = Utc::now();
        let mutations = approve_plan(&plans, plans[1].id, "operator", now).unwrap();
        assert_eq!(
            mutations,
            vec![
                Mutation::SupersedePlan {
                    plan_id: plans[0].id
                },
                Mutation::ApprovePlan {
                    plan_id: plans[1].id,
                    approved_by: "operator".into(),
                    approved_at: now,
                },
            ]
        );

        for m in &mutations {
            m.apply_to_plans(&mut plans).unwrap();
        }
        let approved: Vec<u32> = plans
            .iter()
            .filter(|p| p.mission_id == mission && p.status == PlanStatus::Approved)
            .map(|p| p.version)
            .collect();
        assert_eq!(approved, vec![2]);
        assert_eq!(plans[1].approved_by.as_deref(), Some("operator"));
        assert_eq!(plans[2].status, PlanStatus::Approved, "other mission untouched");
    }

    #[test]
    fn only_drafts_can_be_approved() {
        let mission = Uuid::new_v4();
        let plans = vec![plan(mission, 1, PlanStatus::Cancelled)];
        assert_eq!(
            approve_plan(&plans, plans[0].id, "operator", Utc::now()),
            Err(EngineError::PlanNotDraft {
                plan_id: plans[0].id,
                status: PlanStatus::Cancelled
            })
        );

        let missing = Uuid::new_v4();
        assert_eq!(
            approve_plan(&plans, missing, "operator", Utc::now()),
            Err(EngineError::UnknownPlan(missing))
        );
    }
}
