//! Planner output extraction.
//!
//! Pulls a single plan object out of freeform planning-agent text. Two
//! candidates are tried in order:
//! 1. The contents of the first fenced code block (an optional `json` tag is
//!    accepted).
//! 2. The whole text, trimmed.
//!
//! A candidate is accepted only if it parses as a JSON object that carries a
//! `phases` array. Shape checks beyond that belong to the validator.

use serde_json::{Map, Value};
use thiserror::Error;

const FENCE: &str = "```";

/// Failure to find any plan object in planner output.
///
/// Distinct from a plan that parsed but failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no plan found: output contains no JSON object with a \"phases\" array")]
    NoPlanFound,
}

/// A syntactically valid plan object that has not been validated yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPlan(Map<String, Value>);

impl RawPlan {
    /// Wrap an already-parsed JSON value.
    ///
    /// Returns `None` unless the value is an object with a `phases` array.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) if map.get("phases").is_some_and(Value::is_array) => {
                Some(Self(map))
            }
            _ => None,
        }
    }

    pub fn as_object(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Extract the plan object from raw planner text.
pub fn parse_planner_output(text: &str) -> Result<RawPlan, ParseError> {
    let candidates = fenced_block(text)
        .into_iter()
        .chain(std::iter::once(text.trim()));

    for candidate in candidates {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => {
                if let Some(plan) = RawPlan::from_value(value) {
                    return Ok(plan);
                }
                tracing::debug!("candidate parsed but is not a plan object");
            }
            Err(e) => tracing::debug!(error = %e, "candidate is not JSON"),
        }
    }

    Err(ParseError::NoPlanFound)
}

/// Return the trimmed body of the first fenced code block, if any.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find(FENCE)? + FENCE.len();
    let rest = &text[start..];
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let end = rest.find(FENCE)?;
    Some(rest[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"{"title": "T", "phases": []}"#;

    #[test]
    fn parses_raw_json() {
        let plan = parse_planner_output(PLAN).expect("should parse");
        assert_eq!(plan.get("title"), Some(&Value::from("T")));
    }

    #[test]
    fn parses_fenced_json_with_surrounding_prose() {
        let text = format!("Here is the plan:\n\n```json\n{PLAN}\n```\n\nLet me know!");
        assert!(parse_planner_output(&text).is_ok());
    }

    #[test]
    fn parses_untagged_fence() {
        let text = format!("```\n{PLAN}\n```");
        assert!(parse_planner_output(&text).is_ok());
    }

    #[test]
    fn falls_back_to_raw_text_when_fence_is_not_a_plan() {
        // The fenced block is valid JSON but has no phases; the raw text is
        // not JSON either, so nothing is found.
        let text = "```json\n{\"title\": \"x\"}\n```";
        assert_eq!(parse_planner_output(text), Err(ParseError::NoPlanFound));
    }

    #[test]
    fn fence_candidate_wins_over_raw() {
        let text = format!("```json\n{PLAN}\n```");
        let plan = parse_planner_output(&text).unwrap();
        assert!(plan.get("phases").is_some_and(Value::is_array));
    }

    #[test]
    fn rejects_top_level_array() {
        let text = r#"[{"phases": []}]"#;
        assert_eq!(parse_planner_output(text), Err(ParseError::NoPlanFound));
    }

    #[test]
    fn rejects_non_array_phases() {
        let text = r#"{"title": "T", "phases": {"a": 1}}"#;
        assert_eq!(parse_planner_output(text), Err(ParseError::NoPlanFound));
    }

    #[test]
    fn rejects_prose() {
        assert_eq!(
            parse_planner_output("I could not come up with a plan."),
            Err(ParseError::NoPlanFound)
        );
    }

    #[test]
    fn unterminated_fence_falls_back_to_raw() {
        // No closing fence: the fenced candidate is skipped and the raw text
        // (which starts with the fence) is not JSON.
        let text = format!("```json\n{PLAN}");
        assert_eq!(parse_planner_output(&text), Err(ParseError::NoPlanFound));
    }
}
