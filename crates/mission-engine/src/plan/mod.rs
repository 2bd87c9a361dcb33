//! Plan intake: parse planner output, validate it, normalize it into rows,
//! and manage plan versions.

pub mod approval;
pub mod format;
pub mod normalize;
pub mod parser;
pub mod remap;
pub mod validate;

use serde_json::Value;
use thiserror::Error;

pub use approval::{approve_plan, next_plan_version};
pub use format::{PlannedPhase, PlannedTask, PlannerOutput};
pub use normalize::{
    EdgeRow, NormalizedPlan, PhaseRow, PlanRow, ResolvedPlan, TaskRow, normalize_plan,
};
pub use parser::{ParseError, RawPlan, parse_planner_output};
pub use remap::{IdMap, PlaceholderId, RemapError};
pub use validate::{AgentDirectory, ValidationError, ValidationReport, validate_plan};

/// Why planner output could not be turned into a [`PlannerOutput`].
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Unparsable(#[from] ParseError),

    #[error("plan failed validation with {} error(s)", .0.len())]
    Invalid(Vec<ValidationError>),

    #[error("validated plan could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

impl PlanError {
    /// Validation findings, empty for the other error classes.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            Self::Invalid(errors) => errors,
            _ => &[],
        }
    }
}

/// Parse, validate, and decode planner output in one step.
pub fn ingest_plan<A>(text: &str, agents: &A) -> Result<PlannerOutput, PlanError>
where
    A: AgentDirectory + ?Sized,
{
    let raw = parse_planner_output(text)?;
    let report = validate_plan(&raw, agents);
    if !report.is_valid() {
        tracing::debug!(errors = report.errors.len(), "planner output failed validation");
        return Err(PlanError::Invalid(report.errors));
    }
    decode_plan(raw)
}

/// Decode a validated raw plan into its typed form.
///
/// Explicit `null` fields are treated as absent, matching the validator.
pub fn decode_plan(raw: RawPlan) -> Result<PlannerOutput, PlanError> {
    let mut value = raw.into_value();
    strip_nulls(&mut value);
    let output: PlannerOutput = serde_json::from_value(value)?;
    tracing::debug!(
        title = %output.title,
        phases = output.phases.len(),
        tasks = output.tasks().count(),
        "decoded planner output"
    );
    Ok(output)
}

fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGENTS: &[&str] = &["coder", "reviewer"];

    #[test]
    fn ingest_distinguishes_unparsable_from_invalid() {
        let err = ingest_plan("I could not come up with a plan.", AGENTS).unwrap_err();
        assert!(matches!(err, PlanError::Unparsable(ParseError::NoPlanFound)));
        assert!(err.validation_errors().is_empty());

        let err = ingest_plan(r#"{"title": "", "phases": []}"#, AGENTS).unwrap_err();
        let paths: Vec<&str> = err
            .validation_errors()
            .iter()
            .map(|e| e.path.as_str())
            .collect();
        assert_eq!(paths, vec!["title", "phases"]);
    }

    #[test]
    fn ingest_decodes_fenced_plan_with_nulls() {
        let text = r#"Here is the plan:
```json
{
  "title": "Ship it",
  "description": null,
  "phases": [
    {
      "title": "Build",
      "gate_type": null,
      "tasks": [
        {"key": "a", "title": "A", "instructions": "do a", "agent_id": "coder",
         "priority": null, "depends_on": null},
        {"key": "b", "title": "B", "instructions": "do b", "agent_id": "coder",
         "priority": "high", "depends_on": ["a"], "review_enabled": true,
         "review_agent_id": "reviewer"}
      ]
    }
  ]
}
```
"#;
        let output = ingest_plan(text, AGENTS).unwrap();
        assert_eq!(output.title, "Ship it");
        assert_eq!(output.description, None);
        let tasks: Vec<&PlannedTask> = output.tasks().collect();
        assert_eq!(tasks.len(), 2);
        assert!(tasks[0].depends_on.is_empty());
        assert_eq!(tasks[1].depends_on, vec!["a".to_string()]);
        assert_eq!(tasks[1].review_agent_id.as_deref(), Some("reviewer"));
    }
}
