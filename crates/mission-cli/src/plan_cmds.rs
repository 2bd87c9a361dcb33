//! Operator CLI handlers for plan intake.
//!
//! Implements:
//! - `mission check <file>`      -- parse and validate planner output
//! - `mission normalize <file>`  -- print the storage rows for a plan

use std::io::Read;

use anyhow::{Context, Result, bail};
use uuid::Uuid;

use mission_engine::plan::{
    AgentDirectory, NormalizedPlan, PlanError, PlannerOutput, decode_plan, normalize_plan,
    parse_planner_output, validate_plan,
};

use crate::config::MissionConfig;

// -----------------------------------------------------------------------
// Input
// -----------------------------------------------------------------------

/// Read planner output from a file, or from stdin when `path` is `-`.
pub fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read planner output from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read plan file: {path}"))
}

/// Parse, validate, and decode, printing every validation finding.
pub fn load_plan<A>(text: &str, agents: &A) -> Result<PlannerOutput>
where
    A: AgentDirectory + ?Sized,
{
    let raw = parse_planner_output(text).map_err(PlanError::from)?;

    let report = validate_plan(&raw, agents);
    if !report.is_valid() {
        eprintln!("Plan is invalid:");
        for error in &report.errors {
            eprintln!("  {error}");
        }
        return Err(PlanError::Invalid(report.errors).into());
    }

    Ok(decode_plan(raw)?)
}

// -----------------------------------------------------------------------
// mission check <file>
// -----------------------------------------------------------------------

pub fn cmd_check(config: &MissionConfig, file: &str) -> Result<()> {
    let text = read_input(file)?;
    let output = load_plan(&text, &config.agents)?;

    let tasks = output.tasks().count();
    let edges: usize = output
        .tasks()
        .map(|t| t.depends_on.len() + t.informs.len())
        .sum();

    println!("Plan is valid.");
    println!();
    println!("  Title:  {}", output.title);
    println!("  Phases: {}", output.phases.len());
    println!("  Tasks:  {tasks}");
    println!("  Edges:  {edges}");
    println!();
    for (index, phase) in output.phases.iter().enumerate() {
        println!(
            "  [{index}] {} ({}, {} task(s))",
            phase.title,
            phase.gate_type,
            phase.tasks.len()
        );
    }
    Ok(())
}

// -----------------------------------------------------------------------
// mission normalize <file>
// -----------------------------------------------------------------------

pub struct NormalizeArgs<'a> {
    pub file: &'a str,
    pub mission_id: Uuid,
    pub version: u32,
    pub created_by: &'a str,
    pub output: Option<&'a str>,
}

/// Normalize with the configured breaker as the plan default.
pub fn normalize(
    config: &MissionConfig,
    mut output: PlannerOutput,
    mission_id: Uuid,
    version: u32,
    created_by: &str,
) -> NormalizedPlan {
    if output.circuit_breaker.is_none() {
        output.circuit_breaker = config.circuit_breaker;
    }
    normalize_plan(&output, mission_id, version, created_by)
}

pub fn cmd_normalize(config: &MissionConfig, args: &NormalizeArgs<'_>) -> Result<()> {
    if args.version == 0 {
        bail!("--version must be at least 1");
    }

    let text = read_input(args.file)?;
    let output = load_plan(&text, &config.agents)?;
    let normalized = normalize(config, output, args.mission_id, args.version, args.created_by);

    let json =
        serde_json::to_string_pretty(&normalized).context("failed to serialize normalized plan")?;
    match args.output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write normalized plan to {path}"))?;
            println!(
                "Normalized plan written to {path} ({} phase(s), {} task(s), {} edge(s)).",
                normalized.phases.len(),
                normalized.tasks.len(),
                normalized.edges.len()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use mission_engine::models::{CircuitBreakerConfig, FailurePolicy};
    use mission_test_utils::{PlanJson, task_json};

    use super::*;

    fn config(breaker: Option<CircuitBreakerConfig>) -> MissionConfig {
        MissionConfig {
            agents: BTreeSet::from(["coder".to_string()]),
            circuit_breaker: breaker,
        }
    }

    #[test]
    fn load_plan_keeps_error_classes_apart() {
        let cfg = config(None);

        let err = load_plan("nothing to see", &cfg.agents).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlanError>(),
            Some(PlanError::Unparsable(_))
        ));

        let mut task = task_json("a");
        task["agent_id"] = serde_json::json!("ghost");
        let reply = PlanJson::new("Bad")
            .phase("Only", "all_complete", vec![task])
            .to_agent_reply();
        let err = load_plan(&reply, &cfg.agents).unwrap_err();
        let errors = err
            .downcast_ref::<PlanError>()
            .map(PlanError::validation_errors)
            .unwrap_or_default();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "phases[0].tasks[0].agent_id");
    }

    #[test]
    fn configured_breaker_is_only_a_default() {
        let breaker = CircuitBreakerConfig {
            on_task_failure: FailurePolicy::Continue,
            max_phase_failures: 9,
        };
        let cfg = config(Some(breaker));
        let plan = PlanJson::new("Plan").phase("Only", "all_complete", vec![task_json("a")]);

        let output = load_plan(&plan.to_agent_reply(), &cfg.agents).unwrap();
        let rows = normalize(&cfg, output, Uuid::new_v4(), 1, "tester");
        assert_eq!(rows.plan.circuit_breaker, breaker);

        let plan = plan.circuit_breaker("stop_mission", 1);
        let output = load_plan(&plan.to_agent_reply(), &cfg.agents).unwrap();
        let rows = normalize(&cfg, output, Uuid::new_v4(), 1, "tester");
        assert_eq!(rows.plan.circuit_breaker.on_task_failure, FailurePolicy::StopMission);
    }
}
